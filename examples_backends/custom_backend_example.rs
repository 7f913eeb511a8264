use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};
use tracing_loggly_sink::{
    chunk::{chunk_events, MAX_BULK_BYTES},
    init::init_tracing,
    record::LogEvent,
    selflog::StderrSelfLog,
    sink::BatchSink,
};

/// Example of integrating a completely custom destination by implementing
/// the `BatchSink` trait directly while reusing the chunker. Imagine the
/// bodies go to some proprietary collector.
struct MyCollectorSink;

#[async_trait]
impl BatchSink for MyCollectorSink {
    async fn emit_batch(&self, events: &[LogEvent]) {
        for body in chunk_events(Some(events), MAX_BULK_BYTES, true, &StderrSelfLog) {
            // Here you would hand the body to your own client library.
            println!("[my-collector] {}", body.as_str());
        }
    }
}

#[tokio::main]
async fn main() {
    let sink: Arc<dyn BatchSink> = Arc::new(MyCollectorSink);

    if let Err(e) = init_tracing(sink) {
        eprintln!("failed to install subscriber: {}", e);
        return;
    }

    info!("custom backend example started");
    error!(db = "my-collector", "simulated error sent via custom backend");

    tokio::time::sleep(std::time::Duration::from_secs(3)).await;
}
