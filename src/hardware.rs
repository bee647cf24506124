use core::convert::Infallible;

use embassy_time::{Duration, Instant, Timer};
use embedded_hal::digital::{ErrorType, OutputPin};
use embedded_hal_p2::{
    blocking::delay::{DelayMs, DelayUs},
    digital::v2::{InputPin as InputPinP2, OutputPin as OutputPinP2},
};
use esp_hal::{
    delay::Delay,
    gpio::{AnyPin, DriveMode, Flex, Input, InputConfig, Level, Output, OutputConfig, Pull},
};
use one_wire_bus::OneWire;

use crate::{error::SensorError, sensors::Ds18b20Thermometer, traits::Clock};

pub type Thermometer<'a> = Ds18b20Thermometer<OneWirePin<'a>, Infallible, OneWireDelay>;

/// Open drain GPIO driving the one wire bus.
///
/// The DS18B20 driver still speaks embedded-hal 0.2, so this bridges an
/// esp-hal `Flex` pin to those traits.
pub struct OneWirePin<'a> {
    pin: Flex<'a>,
}

impl<'a> OneWirePin<'a> {
    pub fn new(pin: AnyPin<'a>) -> Self {
        let mut pin = Flex::new(pin);
        pin.apply_output_config(
            &OutputConfig::default()
                .with_drive_mode(DriveMode::OpenDrain)
                .with_pull(Pull::Up),
        );
        pin.apply_input_config(&InputConfig::default().with_pull(Pull::Up));
        pin.set_high();
        pin.set_output_enable(true);
        pin.set_input_enable(true);
        Self { pin }
    }
}

impl InputPinP2 for OneWirePin<'_> {
    type Error = Infallible;

    fn is_high(&self) -> Result<bool, Self::Error> {
        Ok(self.pin.is_high())
    }

    fn is_low(&self) -> Result<bool, Self::Error> {
        Ok(self.pin.is_low())
    }
}

impl OutputPinP2 for OneWirePin<'_> {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.pin.set_low();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.pin.set_high();
        Ok(())
    }
}

/// Busy-wait delay with the embedded-hal 0.2 traits the one wire driver wants.
///
/// Nothing else runs on the executor while this spins, including `net_task`,
/// so a temperature read holds the network stack for the length of a
/// conversion.
pub struct OneWireDelay(Delay);

impl OneWireDelay {
    pub fn new() -> Self {
        Self(Delay::new())
    }
}

impl DelayUs<u16> for OneWireDelay {
    fn delay_us(&mut self, us: u16) {
        self.0.delay_micros(u32::from(us));
    }
}

impl DelayMs<u16> for OneWireDelay {
    fn delay_ms(&mut self, ms: u16) {
        self.0.delay_millis(u32::from(ms));
    }
}

/// External motion indicator wired between two GPIOs.
///
/// The return pin is held low and the signal pin follows the motion flag.
pub struct MotionIndicator<'a> {
    signal: Output<'a>,
    _return: Output<'a>,
}

impl ErrorType for MotionIndicator<'_> {
    type Error = Infallible;
}

impl OutputPin for MotionIndicator<'_> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.signal.set_low();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.signal.set_high();
        Ok(())
    }
}

pub struct ReporterHardware<'a> {
    pub led: Output<'a>,
    pub motion: Input<'a>,
    pub indicator: MotionIndicator<'a>,
    pub thermometer: Thermometer<'a>,
}

impl<'a> ReporterHardware<'a> {
    pub fn new<LED, ONEWIRE, PIR, SIGNAL, RETURN>(
        led_gpio: LED,
        one_wire_gpio: ONEWIRE,
        pir_gpio: PIR,
        indicator_signal_gpio: SIGNAL,
        indicator_return_gpio: RETURN,
    ) -> Result<Self, SensorError>
    where
        LED: Into<AnyPin<'a>>,
        ONEWIRE: Into<AnyPin<'a>>,
        PIR: Into<AnyPin<'a>>,
        SIGNAL: Into<AnyPin<'a>>,
        RETURN: Into<AnyPin<'a>>,
    {
        // LED is active low, start with it off
        let led = Output::new(led_gpio.into(), Level::High, OutputConfig::default());

        let motion = Input::new(pir_gpio.into(), InputConfig::default().with_pull(Pull::Down));

        let indicator = MotionIndicator {
            signal: Output::new(
                indicator_signal_gpio.into(),
                Level::Low,
                OutputConfig::default(),
            ),
            _return: Output::new(
                indicator_return_gpio.into(),
                Level::Low,
                OutputConfig::default(),
            ),
        };

        let bus = OneWire::new(OneWirePin::new(one_wire_gpio.into()))
            .map_err(|_| SensorError::Bus)?;
        let thermometer = Ds18b20Thermometer::new(bus, OneWireDelay::new());

        Ok(Self {
            led,
            motion,
            indicator,
            thermometer,
        })
    }
}

/// Clock backed by the embassy time driver
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&mut self, duration: Duration) {
        Timer::after(duration).await;
    }
}
