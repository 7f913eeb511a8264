use crate::record::LogEvent;
use async_trait::async_trait;
use std::error::Error;

/// Asynchronous destination for batches of [`LogEvent`]s collected by the
/// logging layer.
///
/// Implementations own the whole delivery of a batch. The layer calls
/// `emit_batch` from its background task, one batch at a time, and never
/// from an application thread.
#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Deliver one batch.
    ///
    /// **Parameters**
    /// - `events`: events collected since the previous batch, in the order
    ///   they were observed.
    ///
    /// Failures are the sink's business: a batch is never handed over twice,
    /// so implementations report problems through their own diagnostics
    /// channel instead of returning them.
    async fn emit_batch(&self, events: &[LogEvent]);

    /// Flush any buffered records, if the backend implements buffering.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
