//! ABOUTME: Shared testing utilities and helper functions
//! ABOUTME: Common telemetry fixtures for all crates

use serde_json::json;

/// Pool name used throughout the test suites
pub const TEST_POOL: &str = "tank";

/// Second pool for key-switch scenarios
pub const OTHER_POOL: &str = "backup";

/// An iostat frame as the backend pushes it, without a timestamp
pub fn iostat_frame(read_iops: u64, write_iops: u64, read_bw: u64, write_bw: u64) -> String {
    json!({
        "pool": TEST_POOL,
        "alloc": "1073741824",
        "free": "2147483648",
        "read_iops": read_iops,
        "write_iops": write_iops,
        "read_bw": read_bw,
        "write_bw": write_bw,
    })
    .to_string()
}

/// An iostat frame carrying an explicit RFC3339 timestamp
pub fn iostat_frame_at(read_iops: u64, timestamp: &str) -> String {
    json!({
        "read_iops": read_iops,
        "write_iops": 0,
        "read_bw": 0,
        "write_bw": 0,
        "timestamp": timestamp,
    })
    .to_string()
}

/// A JSON array of `count` readings, as the seed endpoint returns them
pub fn seed_body(count: u64) -> serde_json::Value {
    let readings: Vec<_> = (0..count)
        .map(|i| {
            json!({
                "read_iops": i,
                "write_iops": i * 2,
                "read_bw": i * 4096,
                "write_bw": i * 8192,
                "timestamp": 1_700_000_000 + i,
            })
        })
        .collect();
    serde_json::Value::Array(readings)
}

/// Helper for creating temporary directories in tests
pub fn temp_dir_path() -> std::path::PathBuf {
    std::env::temp_dir().join("poolwatch-test")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_body_length() {
        let body = seed_body(3);
        assert_eq!(body.as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn test_iostat_frame_is_json() {
        let frame = iostat_frame(1, 2, 3, 4);
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["read_iops"], 1);
        assert_eq!(value["pool"], TEST_POOL);
    }
}
