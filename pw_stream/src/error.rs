/// Errors raised inside the telemetry stream subsystem
///
/// None of these reach observers directly: transport failures become
/// connection state, malformed frames are dropped.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed frame: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid timestamp in frame: {0}")]
    Timestamp(String),

    #[error("Seed request failed: {0}")]
    Seed(#[from] reqwest::Error),

    #[error("Seed endpoint returned status {0}")]
    SeedStatus(u16),

    #[error(transparent)]
    Config(#[from] pw_core::Error),
}

pub type Result<T> = std::result::Result<T, StreamError>;
