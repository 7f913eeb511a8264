use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use tracing_loggly_sink::init::init_tracing;
use tracing_loggly_sink::noop_sink::NoopSink;

#[tokio::main]
async fn main() {
    let sink = Arc::new(NoopSink::default());
    if let Err(e) = init_tracing(sink) {
        eprintln!("failed to install subscriber: {}", e);
        return;
    }

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error {{iteration}}");
    }

    let elapsed = start.elapsed();
    println!("default config: sent {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    // Give background task a little time to drain the channel
    tokio::time::sleep(std::time::Duration::from_secs(3)).await;
}
