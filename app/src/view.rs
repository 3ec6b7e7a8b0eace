//! ABOUTME: Terminal rendering of stream state and the latest sample
//! ABOUTME: Pure formatting so the watch loop stays free of layout code

use pw_stream::{ConnectionState, ConnectionStatus, Sample};

const UNITS: [&str; 5] = ["B/s", "KiB/s", "MiB/s", "GiB/s", "TiB/s"];

/// Format a byte rate with binary units, one decimal place
pub fn format_rate(bytes_per_sec: f64) -> String {
    let mut value = bytes_per_sec.max(0.0);
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{:.0} {}", value, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

fn status_label(state: &ConnectionState, max_reconnects: u32) -> String {
    match state.status {
        ConnectionStatus::Closed if state.reconnect_attempts >= max_reconnects => {
            "closed, gave up".to_string()
        }
        ConnectionStatus::Closed if state.reconnect_attempts > 0 => {
            format!("closed, retry {}/{}", state.reconnect_attempts, max_reconnects)
        }
        status => status.to_string(),
    }
}

/// One status line for `key`
pub fn render_line(
    key: &str,
    state: &ConnectionState,
    latest: Option<&Sample>,
    points: usize,
    max_reconnects: u32,
) -> String {
    let mut line = format!("{} [{}]", key, status_label(state, max_reconnects));

    match latest {
        Some(sample) => line.push_str(&format!(
            " r={:.0} w={:.0} iops  r={} w={}  ({} pts, {})",
            sample.read_iops,
            sample.write_iops,
            format_rate(sample.read_bandwidth),
            format_rate(sample.write_bandwidth),
            points,
            sample.captured_at.format("%H:%M:%S"),
        )),
        None => line.push_str(" waiting for data"),
    }

    if let Some(error) = &state.last_error {
        line.push_str(&format!("  last error: {}", error));
    }
    line
}
