//! Hardware abstraction traits
//!
//! Pins use the `embedded-hal` digital traits directly; everything else the
//! report loop touches goes through the traits below so it can be swapped
//! for test doubles.

#![allow(async_fn_in_trait)]

use embassy_time::{Duration, Instant};

use crate::error::{NetError, SensorError};

/// Trait for temperature sensors
pub trait TemperatureSensor {
    /// Initialize the sensor
    fn init(&mut self) -> Result<(), SensorError>;

    /// Start a conversion and read the result in Celsius
    fn read_temperature(&mut self) -> Result<f32, SensorError>;
}

/// An open TCP connection to the report host
pub trait Connection {
    async fn send(&mut self, bytes: &[u8]) -> Result<(), NetError>;

    /// True once at least one byte of the response is waiting to be read
    fn response_available(&mut self) -> bool;

    /// Graceful shutdown after a completed exchange
    async fn close(&mut self);

    /// Drop the connection without waiting for the peer
    async fn abort(&mut self);
}

/// Something that can open outbound TCP connections by host name
pub trait TcpConnector {
    type Connection<'a>: Connection
    where
        Self: 'a;

    async fn connect(&mut self, host: &str, port: u16) -> Result<Self::Connection<'_>, NetError>;
}

/// Monotonic time source and sleep primitive
pub trait Clock {
    fn now(&self) -> Instant;

    async fn sleep(&mut self, duration: Duration);
}
