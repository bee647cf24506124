use core::fmt::Debug;

use ds18b20::{Ds18b20, Resolution};
use embedded_hal_p2::{
    blocking::delay::{DelayMs, DelayUs},
    digital::v2::{InputPin, OutputPin},
};
use log::{error, info, warn};
use one_wire_bus::{Address, OneWire};

use crate::error::SensorError;
use crate::traits::TemperatureSensor;

/// The first DS18B20 found on a one wire bus
pub struct Ds18b20Thermometer<P, E, D>
where
    P: InputPin<Error = E> + OutputPin<Error = E>,
    E: Debug,
    D: DelayMs<u16> + DelayUs<u16>,
{
    bus: OneWire<P>,
    delay: D,
    sensor: Option<Ds18b20>,
}

impl<P, E, D> Ds18b20Thermometer<P, E, D>
where
    P: InputPin<Error = E> + OutputPin<Error = E>,
    E: Debug,
    D: DelayMs<u16> + DelayUs<u16>,
{
    pub fn new(bus: OneWire<P>, delay: D) -> Self {
        Self {
            bus,
            delay,
            sensor: None,
        }
    }

    pub fn address(&self) -> Option<Address> {
        self.sensor.as_ref().map(|s| *s.address())
    }

    /// Walk the bus, log every device and pick the first DS18B20
    fn scan(&mut self) -> Result<Ds18b20, SensorError> {
        info!("Scanning one wire bus");

        let mut found = None;
        for device_address in self.bus.devices(false, &mut self.delay) {
            let device_address = match device_address {
                Ok(address) => address,
                Err(e) => {
                    error!("One wire search failed ({:?})", e);
                    return Err(SensorError::Bus);
                }
            };
            info!("Found one wire device at address: {:?}", device_address);

            if found.is_none() && device_address.family_code() == ds18b20::FAMILY_CODE {
                found = Some(device_address);
            }
        }

        let address = found.ok_or(SensorError::NoDevice)?;
        Ds18b20::new::<E>(address).map_err(|_| SensorError::NoDevice)
    }
}

impl<P, E, D> TemperatureSensor for Ds18b20Thermometer<P, E, D>
where
    P: InputPin<Error = E> + OutputPin<Error = E>,
    E: Debug,
    D: DelayMs<u16> + DelayUs<u16>,
{
    fn init(&mut self) -> Result<(), SensorError> {
        let sensor = self.scan()?;
        info!("Using DS18B20 at {:?}", sensor.address());
        self.sensor = Some(sensor);
        Ok(())
    }

    fn read_temperature(&mut self) -> Result<f32, SensorError> {
        if self.sensor.is_none() {
            warn!("No DS18B20 selected, rescanning");
            self.init()?;
        }

        if let Err(e) = ds18b20::start_simultaneous_temp_measurement(&mut self.bus, &mut self.delay)
        {
            error!("Failed to start temperature measurement ({:?})", e);
            return Err(SensorError::Bus);
        }
        // Blocking: the executor stalls for the whole conversion (750 ms at 12 bits)
        Resolution::Bits12.delay_for_measurement_time(&mut self.delay);

        let sensor = self.sensor.as_ref().ok_or(SensorError::NoDevice)?;
        match sensor.read_data(&mut self.bus, &mut self.delay) {
            Ok(data) => Ok(data.temperature),
            Err(e) => {
                error!("Failed to read DS18B20 ({:?})", e);
                // Might have been unplugged, look again next time
                self.sensor = None;
                Err(SensorError::Bus)
            }
        }
    }
}
