//! ABOUTME: One-shot history backfill from the REST seed endpoint
//! ABOUTME: Fetched once per observer attach, never retried

use async_trait::async_trait;
use pw_config::StreamConfig;
use pw_core::utc_now;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Result, StreamError};
use crate::manager::StreamManager;
use crate::sample::{Sample, WireReading};

/// Seed response: a series of readings or the single current one
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SeedBody {
    Series(Vec<WireReading>),
    Single(WireReading),
}

impl SeedBody {
    fn into_readings(self) -> Vec<WireReading> {
        match self {
            SeedBody::Series(readings) => readings,
            SeedBody::Single(reading) => vec![reading],
        }
    }
}

/// Source of historical samples for a pool
#[async_trait]
pub trait SeedSource: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Vec<Sample>>;
}

/// Seed source backed by the console's REST API
#[derive(Debug, Clone)]
pub struct HttpSeedSource {
    client: Client,
    config: StreamConfig,
}

impl HttpSeedSource {
    pub fn new(config: StreamConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.seed_timeout()).build()?;
        Ok(Self { client, config })
    }

    /// Create seed source with custom client
    pub fn with_client(client: Client, config: StreamConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl SeedSource for HttpSeedSource {
    async fn fetch(&self, key: &str) -> Result<Vec<Sample>> {
        let url = self.config.seed_url(key)?;
        debug!(key = %key, url = %url, "Fetching seed history");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::SeedStatus(status.as_u16()));
        }

        let body: SeedBody = response.json().await?;
        let fetched_at = utc_now();
        body.into_readings()
            .into_iter()
            .map(|reading| reading.into_sample(fetched_at))
            .collect()
    }
}

/// Fetch seed history for `key` once and hand it to the manager
///
/// Call right after the first `connect(key)`. The manager drops the seed if
/// live samples got there first. Returns the number of samples fetched.
pub async fn backfill(manager: &StreamManager, key: &str, source: &dyn SeedSource) -> Result<usize> {
    match source.fetch(key).await {
        Ok(samples) => {
            let count = samples.len();
            manager.seed(key, samples);
            Ok(count)
        }
        Err(e) => {
            warn!(key = %key, error = %e, "Seed history unavailable");
            Err(e)
        }
    }
}
