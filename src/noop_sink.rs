use crate::record::LogEvent;
use crate::sink::BatchSink;
use async_trait::async_trait;

/// A sink that simply drops every batch.
///
/// Useful for measuring the overhead of the layer itself without any
/// external I/O, and for unit tests that don't care about delivery.
#[derive(Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl BatchSink for NoopSink {
    async fn emit_batch(&self, _events: &[LogEvent]) {}
}
