//! Status LED blink codes
//!
//! The LED is the only status channel a user without a serial console has.
//!
//! | Pattern                        | Meaning                      |
//! |--------------------------------|------------------------------|
//! | continuous blink               | connecting to WiFi           |
//! | solid on for 5 seconds         | startup complete             |
//! | 1 blink                        | report delivered             |
//! | 2 blinks                       | temperature sensor fault     |
//! | 3 blinks                       | report host unreachable      |
//! | 4 blinks                       | no response from report host |

use embedded_hal::digital::{OutputPin, PinState};
use log::error;

use crate::config::{BLINK_OFF, BLINK_ON, CONNECTING_BLINK_OFF, CONNECTING_BLINK_ON, STARTUP_SOLID};
use crate::traits::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkCode {
    Delivered,
    SensorFault,
    ConnectFailure,
    ResponseTimeout,
}

impl BlinkCode {
    pub fn count(self) -> usize {
        match self {
            BlinkCode::Delivered => 1,
            BlinkCode::SensorFault => 2,
            BlinkCode::ConnectFailure => 3,
            BlinkCode::ResponseTimeout => 4,
        }
    }
}

pub struct StatusLed<P> {
    pin: P,
    active_low: bool,
}

impl<P: OutputPin> StatusLed<P> {
    /// Wrap the LED pin and switch the LED off.
    ///
    /// Most ESP dev boards wire the onboard LED to sink current, so it lights
    /// when the pin is driven low; pass `active_low = true` for those.
    pub fn new(pin: P, active_low: bool) -> Self {
        let mut led = Self { pin, active_low };
        led.off();
        led
    }

    pub fn on(&mut self) {
        self.set(true);
    }

    pub fn off(&mut self) {
        self.set(false);
    }

    fn set(&mut self, lit: bool) {
        let state = PinState::from(lit != self.active_low);
        if let Err(e) = self.pin.set_state(state) {
            error!("Failed to write to LED (error: {:?})", e);
        }
    }

    /// `times` pulses of on/off, ending with the LED off
    pub async fn blink<C: Clock>(&mut self, clock: &mut C, times: usize) {
        for _ in 0..times {
            self.on();
            clock.sleep(BLINK_ON).await;
            self.off();
            clock.sleep(BLINK_OFF).await;
        }
    }

    pub async fn signal<C: Clock>(&mut self, clock: &mut C, code: BlinkCode) {
        self.blink(clock, code.count()).await;
    }

    /// One period of the "still connecting" pattern
    pub async fn connecting<C: Clock>(&mut self, clock: &mut C) {
        self.on();
        clock.sleep(CONNECTING_BLINK_ON).await;
        self.off();
        clock.sleep(CONNECTING_BLINK_OFF).await;
    }

    pub async fn startup_complete<C: Clock>(&mut self, clock: &mut C) {
        self.on();
        clock.sleep(STARTUP_SOLID).await;
        self.off();
    }
}
