//! Error types shared by the report loop and the hardware layer

use thiserror::Error;

use crate::blink::BlinkCode;

/// Reasons a single report cycle was abandoned.
///
/// None of these are fatal: the loop signals the matching blink code and
/// starts over after [`crate::config::RETRY_DELAY`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReportError {
    #[error("Temp error!")]
    SensorFault,
    #[error("Connection failed")]
    ConnectFailure,
    #[error(">>> Client Timeout !")]
    ResponseTimeout,
}

impl ReportError {
    pub fn blink_code(self) -> BlinkCode {
        match self {
            ReportError::SensorFault => BlinkCode::SensorFault,
            ReportError::ConnectFailure => BlinkCode::ConnectFailure,
            ReportError::ResponseTimeout => BlinkCode::ResponseTimeout,
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("no DS18B20 found on the one wire bus")]
    NoDevice,
    #[error("one wire bus error")]
    Bus,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NetError {
    #[error("WiFi radio could not be initialised")]
    Radio,
    #[error("DNS lookup failed")]
    Dns,
    #[error("TCP connect failed")]
    Connect,
    #[error("TCP write failed")]
    Write,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("report subdomain is empty")]
    EmptyDomain,
    #[error("report identifier is empty")]
    EmptyGuid,
}
