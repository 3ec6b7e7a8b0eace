use std::sync::Once;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter variable checked before `RUST_LOG`
pub const LOG_ENV: &str = "POOLWATCH_LOG";

static INIT: Once = Once::new();

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing - safe to call multiple times
///
/// Logs go to stderr so stdout stays free for the console view.
/// `production` gets JSON lines, anything else the compact formatter.
pub fn init_tracing(env: &str, service: &str) {
    INIT.call_once(|| {
        if env == "production" {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(false)
                        .with_writer(std::io::stderr),
                )
                .with(env_filter())
                .init();
        } else {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .with(env_filter())
                .init();
        }

        tracing::info!(service = %service, env = %env, "Tracing initialized");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_idempotent() {
        init_tracing("test", "poolwatch-test");
        init_tracing("production", "poolwatch-test");
    }

    #[test]
    fn test_default_filter_is_info() {
        if std::env::var(LOG_ENV).is_err() && std::env::var("RUST_LOG").is_err() {
            assert_eq!(env_filter().to_string(), "info");
        }
    }
}
