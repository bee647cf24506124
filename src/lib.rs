#![no_std]

extern crate alloc;
#[cfg(test)]
extern crate std;

pub mod blink;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod sensors;
pub mod traits;

#[cfg(feature = "esp32s3")]
pub mod hardware;
#[cfg(feature = "esp32s3")]
pub mod network;

#[cfg(test)]
mod mock;
