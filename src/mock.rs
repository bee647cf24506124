//! In-memory stand-ins for the hardware, used by the unit tests

use core::cell::RefCell;
use core::convert::Infallible;
use std::rc::Rc;
use std::string::{String, ToString};
use std::vec::Vec;

use embassy_time::{Duration, Instant};
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use crate::error::{NetError, SensorError};
use crate::traits::{Clock, Connection, TcpConnector, TemperatureSensor};

/// Clock that only moves when something sleeps on it
pub struct MockClock {
    start: Instant,
    now: Instant,
    sleeps: Vec<Duration>,
}

impl MockClock {
    pub fn new() -> Self {
        let start = Instant::from_millis(1_000);
        Self {
            start,
            now: start,
            sleeps: Vec::new(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.now - self.start
    }

    pub fn sleeps(&self) -> &[Duration] {
        &self.sleeps
    }

    pub fn last_sleep(&self) -> Option<Duration> {
        self.sleeps.last().copied()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.now
    }

    async fn sleep(&mut self, duration: Duration) {
        self.now += duration;
        self.sleeps.push(duration);
    }
}

/// Output pin that remembers every level written to it
#[derive(Clone, Default)]
pub struct RecordingPin {
    levels: Rc<RefCell<Vec<bool>>>,
}

impl RecordingPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn levels(&self) -> Vec<bool> {
        self.levels.borrow().clone()
    }

    pub fn is_set_high(&self) -> bool {
        self.levels.borrow().last().copied().unwrap_or(false)
    }

    /// Number of low to high transitions, counting from an initial low
    pub fn pulses(&self) -> usize {
        let mut previous = false;
        let mut pulses = 0;
        for &level in self.levels.borrow().iter() {
            if level && !previous {
                pulses += 1;
            }
            previous = level;
        }
        pulses
    }
}

impl ErrorType for RecordingPin {
    type Error = Infallible;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.levels.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.levels.borrow_mut().push(true);
        Ok(())
    }
}

pub struct FixedInput(pub bool);

impl ErrorType for FixedInput {
    type Error = Infallible;
}

impl InputPin for FixedInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0)
    }
}

pub struct FixedSensor {
    pub reading: Result<f32, SensorError>,
    pub reads: usize,
}

impl FixedSensor {
    pub fn new(reading: Result<f32, SensorError>) -> Self {
        Self { reading, reads: 0 }
    }
}

impl TemperatureSensor for FixedSensor {
    fn init(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn read_temperature(&mut self) -> Result<f32, SensorError> {
        self.reads += 1;
        self.reading
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetEvent {
    Connect(String, u16),
    Send(String),
    Close,
    Abort,
}

/// How the fake report host behaves
#[derive(Debug, Clone, Copy)]
pub enum HostScript {
    Unreachable,
    /// Response bytes show up after this many polls
    RespondsAfter(usize),
    Silent,
}

pub struct ScriptedConnector {
    script: HostScript,
    events: Rc<RefCell<Vec<NetEvent>>>,
}

impl ScriptedConnector {
    pub fn new(script: HostScript) -> Self {
        Self {
            script,
            events: Rc::default(),
        }
    }

    pub fn events(&self) -> Vec<NetEvent> {
        self.events.borrow().clone()
    }

    pub fn requests(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                NetEvent::Send(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, event: &NetEvent) -> usize {
        self.events.borrow().iter().filter(|e| *e == event).count()
    }
}

pub struct ScriptedConnection {
    script: HostScript,
    polls: usize,
    events: Rc<RefCell<Vec<NetEvent>>>,
}

impl Connection for ScriptedConnection {
    async fn send(&mut self, bytes: &[u8]) -> Result<(), NetError> {
        let request = String::from_utf8(bytes.to_vec()).map_err(|_| NetError::Write)?;
        self.events.borrow_mut().push(NetEvent::Send(request));
        Ok(())
    }

    fn response_available(&mut self) -> bool {
        self.polls += 1;
        match self.script {
            HostScript::RespondsAfter(polls) => self.polls > polls,
            _ => false,
        }
    }

    async fn close(&mut self) {
        self.events.borrow_mut().push(NetEvent::Close);
    }

    async fn abort(&mut self) {
        self.events.borrow_mut().push(NetEvent::Abort);
    }
}

impl TcpConnector for ScriptedConnector {
    type Connection<'a> = ScriptedConnection;

    async fn connect(&mut self, host: &str, port: u16) -> Result<Self::Connection<'_>, NetError> {
        self.events
            .borrow_mut()
            .push(NetEvent::Connect(host.to_string(), port));

        match self.script {
            HostScript::Unreachable => Err(NetError::Connect),
            script => Ok(ScriptedConnection {
                script,
                polls: 0,
                events: self.events.clone(),
            }),
        }
    }
}
