//! Report loop (hardware-independent)
//!
//! One iteration reads the thermometer, connects to the report host, samples
//! the PIR sensor, sends a single HTTP GET and waits for the first response
//! byte. Every failure is reported on the LED and retried after a short pause;
//! nothing is carried over between iterations.

use alloc::string::String;
use core::fmt::Write;

use embassy_time::Duration;
use embedded_hal::digital::{InputPin, OutputPin, PinState};
use log::{error, info, warn};

use crate::{
    blink::{BlinkCode, StatusLed},
    config::{Config, HTTP_PORT, RESPONSE_POLL_INTERVAL, RESPONSE_TIMEOUT, RETRY_DELAY},
    error::ReportError,
    model::{MotionCode, Reading, is_fault_reading},
    traits::{Clock, Connection, TcpConnector, TemperatureSensor},
};

/// Everything the report loop needs from the board
pub struct Device<T, M, I, L, N, C> {
    pub thermometer: T,
    pub motion: M,
    /// Mirrors the motion flag for an external indicator
    pub indicator: I,
    pub led: StatusLed<L>,
    pub network: N,
    pub clock: C,
}

pub struct ReportLoop {
    host: String,
    guid: &'static str,
    interval: Duration,
}

impl ReportLoop {
    pub fn new(config: &Config) -> Self {
        Self {
            host: config.host(),
            guid: config.guid,
            interval: config.report_interval(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Request target for a reading, e.g. `/?mojemereni=23.5&humV=20`
    pub fn query(&self, reading: &Reading) -> String {
        let mut path = String::new();
        let _ = write!(
            path,
            "/?{}={}&humV={}",
            self.guid,
            reading.temperature,
            reading.motion.value()
        );
        path
    }

    pub fn request(&self, path: &str) -> String {
        let mut request = String::new();
        let _ = write!(
            request,
            "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            path, self.host
        );
        request
    }

    /// Request for checking the host is reachable. Carries no reading, so
    /// nothing is recorded on the dashboard.
    pub fn connectivity_request(&self) -> String {
        self.request("/")
    }

    /// Run iterations forever
    pub async fn run<T, M, I, L, N, C>(&self, device: &mut Device<T, M, I, L, N, C>) -> !
    where
        T: TemperatureSensor,
        M: InputPin,
        I: OutputPin,
        L: OutputPin,
        N: TcpConnector,
        C: Clock,
    {
        loop {
            let _ = self.cycle(device).await;
        }
    }

    /// One iteration including the status blink and the following sleep
    pub async fn cycle<T, M, I, L, N, C>(
        &self,
        device: &mut Device<T, M, I, L, N, C>,
    ) -> Result<Reading, ReportError>
    where
        T: TemperatureSensor,
        M: InputPin,
        I: OutputPin,
        L: OutputPin,
        N: TcpConnector,
        C: Clock,
    {
        match self.report(device).await {
            Ok(reading) => {
                device
                    .led
                    .signal(&mut device.clock, BlinkCode::Delivered)
                    .await;
                device.clock.sleep(self.interval).await;
                Ok(reading)
            }
            Err(e) => {
                error!("{}", e);
                device.led.signal(&mut device.clock, e.blink_code()).await;
                device.clock.sleep(RETRY_DELAY).await;
                Err(e)
            }
        }
    }

    /// Read the sensors and deliver one report, without any LED signaling
    pub async fn report<T, M, I, L, N, C>(
        &self,
        device: &mut Device<T, M, I, L, N, C>,
    ) -> Result<Reading, ReportError>
    where
        T: TemperatureSensor,
        M: InputPin,
        I: OutputPin,
        N: TcpConnector,
        C: Clock,
    {
        let temperature = match device.thermometer.read_temperature() {
            Ok(t) if !is_fault_reading(t) => t,
            Ok(_) => return Err(ReportError::SensorFault),
            Err(e) => {
                warn!("Temperature read failed ({})", e);
                return Err(ReportError::SensorFault);
            }
        };
        info!("Temperature: {} C", temperature);

        info!("Connecting to {}", self.host);
        let mut connection = device
            .network
            .connect(&self.host, HTTP_PORT)
            .await
            .map_err(|e| {
                warn!("Could not reach {} ({})", self.host, e);
                ReportError::ConnectFailure
            })?;
        info!("Client connected");

        let motion = sample_motion(&mut device.motion, &mut device.indicator);
        let reading = Reading {
            temperature,
            motion,
        };

        let path = self.query(&reading);
        info!("Requesting URL: {}", path);

        // A failed write shows up as a response timeout below.
        if let Err(e) = connection.send(self.request(&path).as_bytes()).await {
            warn!("Failed to send request ({})", e);
        }

        let deadline = device.clock.now() + RESPONSE_TIMEOUT;
        while !connection.response_available() {
            if device.clock.now() > deadline {
                connection.abort().await;
                return Err(ReportError::ResponseTimeout);
            }
            device.clock.sleep(RESPONSE_POLL_INTERVAL).await;
        }

        connection.close().await;
        info!("Report delivered");

        Ok(reading)
    }
}

/// Read the PIR input once and mirror it onto the indicator output
fn sample_motion<M: InputPin, I: OutputPin>(motion: &mut M, indicator: &mut I) -> MotionCode {
    let detected = motion.is_high().unwrap_or_else(|e| {
        warn!("Failed to read motion sensor ({:?})", e);
        false
    });
    let code = MotionCode::from_flag(detected);

    if let Err(e) = indicator.set_state(PinState::from(code.is_active())) {
        error!("Failed to write motion indicator (error: {:?})", e);
    }

    code
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::SensorError;
    use crate::mock::{
        FixedInput, FixedSensor, HostScript, MockClock, NetEvent, RecordingPin, ScriptedConnector,
    };
    use crate::model::DEVICE_DISCONNECTED_C;
    use embassy_futures::block_on;
    use std::string::ToString;
    use std::vec::Vec;

    type TestDevice =
        Device<FixedSensor, FixedInput, RecordingPin, RecordingPin, ScriptedConnector, MockClock>;

    fn config() -> Config {
        Config {
            wifi_ssid: "ssid",
            wifi_password: "pass",
            domain: "ahoj",
            guid: "mojemereni",
            interval_minutes: 2,
        }
    }

    fn device(reading: Result<f32, SensorError>, motion: bool, host: HostScript) -> TestDevice {
        Device {
            thermometer: FixedSensor::new(reading),
            motion: FixedInput(motion),
            indicator: RecordingPin::new(),
            led: StatusLed::new(RecordingPin::new(), false),
            network: ScriptedConnector::new(host),
            clock: MockClock::new(),
        }
    }

    /// Device plus handles on the pins it owns
    fn device_with_pins(
        reading: Result<f32, SensorError>,
        motion: bool,
        host: HostScript,
    ) -> (TestDevice, RecordingPin, RecordingPin) {
        let led = RecordingPin::new();
        let indicator = RecordingPin::new();
        let mut device = device(reading, motion, host);
        device.led = StatusLed::new(led.clone(), false);
        device.indicator = indicator.clone();
        (device, led, indicator)
    }

    #[test]
    fn delivers_reading_without_motion() {
        let app = ReportLoop::new(&config());
        let (mut device, led, indicator) =
            device_with_pins(Ok(23.5), false, HostScript::RespondsAfter(3));

        let result = block_on(app.cycle(&mut device));

        assert_eq!(
            result,
            Ok(Reading {
                temperature: 23.5,
                motion: MotionCode::Idle
            })
        );
        assert_eq!(
            device.network.events(),
            [
                NetEvent::Connect("ahoj.tmep.cz".to_string(), 80),
                NetEvent::Send(
                    "GET /?mojemereni=23.5&humV=20 HTTP/1.1\r\nHost: ahoj.tmep.cz\r\nConnection: close\r\n\r\n"
                        .to_string()
                ),
                NetEvent::Close,
            ]
        );
        assert_eq!(led.pulses(), 1);
        assert!(!indicator.is_set_high());
        assert_eq!(device.clock.last_sleep(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn motion_sets_code_and_indicator() {
        let app = ReportLoop::new(&config());
        let (mut device, _led, indicator) =
            device_with_pins(Ok(21.0), true, HostScript::RespondsAfter(0));

        let reading = block_on(app.report(&mut device)).unwrap();

        assert_eq!(reading.motion, MotionCode::Detected);
        assert!(indicator.is_set_high());
        assert!(device.network.requests()[0].starts_with("GET /?mojemereni=21&humV=80 "));
    }

    #[test]
    fn sentinel_reading_is_a_sensor_fault() {
        let app = ReportLoop::new(&config());
        let (mut device, led, _indicator) = device_with_pins(
            Ok(DEVICE_DISCONNECTED_C),
            false,
            HostScript::RespondsAfter(0),
        );

        let result = block_on(app.cycle(&mut device));

        assert_eq!(result, Err(ReportError::SensorFault));
        assert!(device.network.events().is_empty());
        assert_eq!(led.pulses(), 2);
        assert_eq!(device.clock.last_sleep(), Some(RETRY_DELAY));
    }

    #[test]
    fn driver_error_is_a_sensor_fault() {
        let app = ReportLoop::new(&config());
        let mut device = device(Err(SensorError::NoDevice), false, HostScript::RespondsAfter(0));

        let result = block_on(app.report(&mut device));

        assert_eq!(result, Err(ReportError::SensorFault));
        assert!(device.network.events().is_empty());
    }

    #[test]
    fn unreachable_host_is_a_connect_failure() {
        let app = ReportLoop::new(&config());
        let (mut device, led, indicator) =
            device_with_pins(Ok(19.25), true, HostScript::Unreachable);

        let result = block_on(app.cycle(&mut device));

        assert_eq!(result, Err(ReportError::ConnectFailure));
        assert!(device.network.requests().is_empty());
        assert_eq!(led.pulses(), 3);
        // Motion is only sampled once connected
        assert!(indicator.levels().is_empty());
        assert_eq!(device.clock.last_sleep(), Some(RETRY_DELAY));
    }

    #[test]
    fn silent_host_times_out_once() {
        let app = ReportLoop::new(&config());
        let (mut device, led, _indicator) =
            device_with_pins(Ok(23.5), false, HostScript::Silent);

        let result = block_on(app.cycle(&mut device));

        assert_eq!(result, Err(ReportError::ResponseTimeout));
        assert_eq!(device.network.requests().len(), 1);
        assert_eq!(device.network.count(&NetEvent::Abort), 1);
        assert_eq!(device.network.count(&NetEvent::Close), 0);
        assert_eq!(led.pulses(), 4);
        assert_eq!(device.clock.last_sleep(), Some(RETRY_DELAY));

        let waited: Duration = device
            .clock
            .sleeps()
            .iter()
            .filter(|d| **d == RESPONSE_POLL_INTERVAL)
            .fold(Duration::from_ticks(0), |acc, d| acc + *d);
        assert!(waited > RESPONSE_TIMEOUT);
        assert!(waited <= RESPONSE_TIMEOUT + RESPONSE_POLL_INTERVAL * 2);
    }

    #[test]
    fn late_response_inside_the_window_is_delivered() {
        let app = ReportLoop::new(&config());
        // 400 polls at 10 ms is well inside 5 s
        let mut device = device(Ok(30.0), false, HostScript::RespondsAfter(400));

        assert!(block_on(app.report(&mut device)).is_ok());
        assert_eq!(device.network.count(&NetEvent::Abort), 0);
        assert_eq!(device.network.count(&NetEvent::Close), 1);
    }

    #[test]
    fn query_has_one_identifier_and_one_motion_pair() {
        let app = ReportLoop::new(&config());

        for temperature in [23.5, -3.75, 0.0, 85.0] {
            for motion in [MotionCode::Idle, MotionCode::Detected] {
                let path = app.query(&Reading {
                    temperature,
                    motion,
                });

                let query = path.strip_prefix("/?").unwrap();
                let pairs: Vec<(&str, &str)> = query
                    .split('&')
                    .map(|pair| pair.split_once('=').unwrap())
                    .collect();

                assert_eq!(pairs.len(), 2, "{}", path);
                assert_eq!(pairs[0].0, "mojemereni");
                assert_eq!(pairs[0].1.parse::<f32>().unwrap(), temperature);
                assert_eq!(pairs[1].0, "humV");
                assert!(["20", "80"].contains(&pairs[1].1));
            }
        }
    }

    #[test]
    fn connectivity_request_carries_no_reading() {
        let app = ReportLoop::new(&config());

        let request = app.connectivity_request();

        assert!(request.starts_with("GET / HTTP/1.1\r\n"));
        assert!(request.contains("Host: ahoj.tmep.cz\r\n"));
        assert!(!request.contains("mojemereni"));
        assert!(!request.contains('='));
    }

    #[test]
    fn consecutive_cycles_share_no_state() {
        let app = ReportLoop::new(&config());
        let mut device = device(Ok(22.0), false, HostScript::RespondsAfter(1));

        assert!(block_on(app.cycle(&mut device)).is_ok());
        device.thermometer.reading = Ok(DEVICE_DISCONNECTED_C);
        assert_eq!(
            block_on(app.cycle(&mut device)),
            Err(ReportError::SensorFault)
        );
        device.thermometer.reading = Ok(22.5);
        assert!(block_on(app.cycle(&mut device)).is_ok());

        assert_eq!(device.thermometer.reads, 3);
        assert_eq!(device.network.requests().len(), 2);
    }
}
