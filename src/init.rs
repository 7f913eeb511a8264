use crate::layer::LogglyLayer;
use crate::sink::BatchSink;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the logging layer.
///
/// Controls the size of the internal buffer, the number of events that
/// triggers a batch, how often a partial batch is flushed, the minimum
/// level captured, and whether events are also printed to the console
/// through a `fmt` layer.
///
/// **Fields**
/// - `channel_buffer`: maximum number of [`LogEvent`]s queued before new
///   events start being dropped.
/// - `batch_size`: number of events that triggers an immediate batch.
/// - `flush_interval`: maximum time between batches even when the batch is
///   not full.
/// - `min_level`: least severe level shipped to the sink.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   installed next to [`LogglyLayer`].
///
/// [`LogEvent`]: crate::record::LogEvent
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub min_level: Level,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            batch_size: 1000,
            flush_interval: Duration::from_secs(2),
            min_level: Level::INFO,
            enable_stdout: true,
        }
    }
}

/// Initialize global `tracing` subscriber using the provided sink and
/// [`LayerConfig`].
///
/// **Parameters**
/// - `sink`: implementation of [`BatchSink`] that will receive batches of
///   events.
/// - `config`: [`LayerConfig`] controlling buffering and batching
///   behavior of the layer.
///
/// **Returns**
/// - The handle of the background batching task. It completes after the
///   subscriber is dropped and the last batch has been emitted.
/// - `Err(..)` if a global subscriber was already installed.
///
/// Must be called from within a Tokio runtime.
pub fn init_tracing_with_config(
    sink: Arc<dyn BatchSink>,
    config: LayerConfig,
) -> Result<JoinHandle<()>, SetGlobalDefaultError> {
    let (layer, handle) = LogglyLayer::new(
        sink,
        config.channel_buffer,
        config.batch_size,
        config.flush_interval,
        config.min_level,
    );

    // The two subscriber shapes have different types, hence two branches.
    let installed = if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)
    };

    match installed {
        Ok(()) => Ok(handle),
        Err(e) => {
            handle.abort();
            Err(e)
        }
    }
}

/// Initialize tracing with sensible defaults.
///
/// Equivalent to calling [`init_tracing_with_config`] with
/// [`LayerConfig::default`]. This is the recommended entrypoint for
/// typical microservices.
pub fn init_tracing(sink: Arc<dyn BatchSink>) -> Result<JoinHandle<()>, SetGlobalDefaultError> {
    init_tracing_with_config(sink, LayerConfig::default())
}
