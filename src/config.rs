//! Build time configuration
//!
//! Credentials and report settings are baked in from environment variables
//! when the firmware is compiled, e.g.
//! `WIFI_SSID=... WIFI_PASSWORD=... TMEP_DOMAIN=ahoj TMEP_GUID=mojemereni cargo build`.

use alloc::string::String;
use core::fmt;
use embassy_time::Duration;
use log::warn;

use crate::error::ConfigError;

pub const HOST_SUFFIX: &str = ".tmep.cz";
pub const HTTP_PORT: u16 = 80;

pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);
pub const RESPONSE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Delay before the loop starts over after any failure.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

pub const BLINK_ON: Duration = Duration::from_millis(100);
pub const BLINK_OFF: Duration = Duration::from_millis(100);

pub const CONNECTING_BLINK_ON: Duration = Duration::from_millis(100);
pub const CONNECTING_BLINK_OFF: Duration = Duration::from_millis(500);

pub const STARTUP_SOLID: Duration = Duration::from_secs(5);

pub const DEFAULT_DOMAIN: &str = "ahoj";
pub const DEFAULT_GUID: &str = "mojemereni";
pub const DEFAULT_INTERVAL_MINUTES: u32 = 1;

#[derive(Clone)]
pub struct Config {
    pub wifi_ssid: &'static str,
    pub wifi_password: &'static str,
    /// Subdomain of tmep.cz the readings are sent to
    pub domain: &'static str,
    /// Name of the query parameter carrying the temperature
    pub guid: &'static str,
    pub interval_minutes: u32,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            wifi_ssid: option_env!("WIFI_SSID").unwrap_or(""),
            wifi_password: option_env!("WIFI_PASSWORD").unwrap_or(""),
            domain: option_env!("TMEP_DOMAIN").unwrap_or(DEFAULT_DOMAIN),
            guid: option_env!("TMEP_GUID").unwrap_or(DEFAULT_GUID),
            interval_minutes: parse_interval(option_env!("REPORT_INTERVAL_MINUTES")),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domain.is_empty() {
            return Err(ConfigError::EmptyDomain);
        }
        if self.guid.is_empty() {
            return Err(ConfigError::EmptyGuid);
        }
        Ok(())
    }

    /// Fully qualified name of the report host, `<domain>.tmep.cz`
    pub fn host(&self) -> String {
        let mut host = String::with_capacity(self.domain.len() + HOST_SUFFIX.len());
        host.push_str(self.domain);
        host.push_str(HOST_SUFFIX);
        host
    }

    /// Sleep between successful reports
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval_minutes) * 60)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("wifi_ssid", &self.wifi_ssid)
            .field("wifi_password", &"<redacted>")
            .field("domain", &self.domain)
            .field("guid", &self.guid)
            .field("interval_minutes", &self.interval_minutes)
            .finish()
    }
}

fn parse_interval(raw: Option<&str>) -> u32 {
    match raw {
        None => DEFAULT_INTERVAL_MINUTES,
        Some(raw) => match raw.trim().parse::<u32>() {
            Ok(minutes) if minutes > 0 => minutes,
            _ => {
                warn!(
                    "Invalid REPORT_INTERVAL_MINUTES {:?}, using {} minute(s)",
                    raw, DEFAULT_INTERVAL_MINUTES
                );
                DEFAULT_INTERVAL_MINUTES
            }
        },
    }
}
