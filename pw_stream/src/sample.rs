//! ABOUTME: Telemetry sample value type and the iostat wire codec
//! ABOUTME: Turns pushed JSON frames into immutable samples

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StreamError};

/// One I/O telemetry reading for a pool
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub read_iops: f64,
    pub write_iops: f64,
    /// Bytes per second read
    pub read_bandwidth: f64,
    /// Bytes per second written
    pub write_bandwidth: f64,
    pub captured_at: DateTime<Utc>,
}

impl Sample {
    pub fn new(
        read_iops: f64,
        write_iops: f64,
        read_bandwidth: f64,
        write_bandwidth: f64,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            read_iops,
            write_iops,
            read_bandwidth,
            write_bandwidth,
            captured_at,
        }
    }

    pub fn total_iops(&self) -> f64 {
        self.read_iops + self.write_iops
    }

    pub fn total_bandwidth(&self) -> f64 {
        self.read_bandwidth + self.write_bandwidth
    }
}

/// Reading as the backend serialises it
///
/// Extra fields such as `pool`, `alloc` and `free` are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct WireReading {
    pub read_iops: f64,
    pub write_iops: f64,
    pub read_bw: f64,
    pub write_bw: f64,
    #[serde(default)]
    pub timestamp: Option<WireTimestamp>,
}

/// RFC3339 text or UNIX epoch seconds
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireTimestamp {
    Epoch(f64),
    Text(String),
}

impl WireReading {
    /// Convert to a sample, stamping `received_at` when the frame carries no time
    pub fn into_sample(self, received_at: DateTime<Utc>) -> Result<Sample> {
        let captured_at = match self.timestamp {
            None => received_at,
            Some(WireTimestamp::Epoch(secs)) => pw_core::from_epoch_secs(secs)
                .ok_or_else(|| StreamError::Timestamp(secs.to_string()))?,
            Some(WireTimestamp::Text(text)) => DateTime::parse_from_rfc3339(&text)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| StreamError::Timestamp(text))?,
        };

        Ok(Sample::new(
            self.read_iops,
            self.write_iops,
            self.read_bw,
            self.write_bw,
            captured_at,
        ))
    }
}

/// Parse one pushed text frame
pub fn parse_frame(text: &str, received_at: DateTime<Utc>) -> Result<Sample> {
    let reading: WireReading = serde_json::from_str(text)?;
    reading.into_sample(received_at)
}
