use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

use tracing_loggly_sink::config::LogglyConfig;
use tracing_loggly_sink::init::init_tracing;
use tracing_loggly_sink::loggly::LogglySink;

/// Reads `LOGGLY_API_KEY` (and optionally `LOGGLY_TAGS`, `LOGGLY_HOST`,
/// `LOGGLY_INCLUDE_DIAGNOSTICS`) and ships a couple of events.
#[tokio::main]
async fn main() {
    let config = match LogglyConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("loggly config: {}", e);
            return;
        }
    };
    let sink = Arc::new(LogglySink::new(config));
    if let Err(e) = init_tracing(sink) {
        eprintln!("failed to install subscriber: {}", e);
        return;
    }

    info!("starting service");

    error!(
        user_id = 42,
        reason = "invalid password",
        "authentication failed for {{user_id}}"
    );

    sleep(Duration::from_secs(3)).await;
}
