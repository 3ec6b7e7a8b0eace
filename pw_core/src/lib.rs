//! ABOUTME: Core types, errors, time helpers and tracing setup
//! ABOUTME: Foundation crate used by all other poolwatch components

pub mod error;
pub mod telemetry;
pub mod time;

pub use error::{Error, Result};
pub use time::{from_epoch_secs, to_rfc3339, utc_now, MonotonicTimer};
