use crate::record::{ExceptionInfo, LogEvent, LogEventProperty, PropertyValue};
use crate::selflog::SELF_LOG_TARGET;
use crate::sink::BatchSink;
use crate::template::MessageTemplate;
use chrono::Utc;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Event targets the layer never captures: its own diagnostics and the
/// HTTP stack used to ship batches, which would otherwise feed back into
/// the next batch.
const IGNORED_TARGETS: &[&str] = &[SELF_LOG_TARGET, "reqwest", "hyper", "h2", "rustls"];

/// Property carrying the `tracing` target of an event.
pub const SOURCE_CONTEXT_KEY: &str = "SourceContext";

/// `tracing_subscriber` layer that observes events and hands them, in
/// batches, to a [`BatchSink`] via a bounded channel and background task.
///
/// Events at `min_level` and above are turned into [`LogEvent`]s. The
/// background task emits a batch once `batch_size` events are waiting or
/// `flush_interval` elapses, whichever comes first, and awaits each batch
/// before starting the next so batches never overlap.
///
/// `tracing` hands over the message already formatted, so the layer cannot
/// tell a hole written as `{{name}}` from braces produced by a format
/// argument. The text is parsed with [`MessageTemplate::parse_formatted`]:
/// a `{name}` or `{name:fmt}` without whitespace is substituted with the
/// field of that name, while anything like `{a: 1}` stays literal. Keep
/// formatted values free of bare `{field}` text if it must ship verbatim.
pub struct LogglyLayer {
    sender: mpsc::Sender<LogEvent>,
    min_level: Level,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Successfully enqueued into channel.
    pub enqueued_events: Arc<AtomicU64>,
    /// Dropped because the channel was full.
    pub dropped_events: Arc<AtomicU64>,
}

impl LogglyLayer {
    /// Create a new layer and spawn the background batching task.
    ///
    /// Must be called from within a Tokio runtime. Minimal thresholds are
    /// enforced for `buffer`, `batch_size` and `flush_interval` to avoid
    /// degenerate configurations. The task flushes what it holds and exits
    /// once the layer is dropped.
    pub fn new(
        sink: Arc<dyn BatchSink>,
        buffer: usize,
        batch_size: usize,
        flush_interval: Duration,
        min_level: Level,
    ) -> (Self, JoinHandle<()>) {
        let buffer = buffer.max(16);
        let batch_size = batch_size.max(1);
        let flush_interval = flush_interval.max(Duration::from_millis(10));

        let (tx, mut rx) = mpsc::channel::<LogEvent>(buffer);

        let total_events = Arc::new(AtomicU64::new(0));
        let enqueued_events = Arc::new(AtomicU64::new(0));
        let dropped_events = Arc::new(AtomicU64::new(0));

        let handle = tokio::spawn(async move {
            let mut batch = Vec::with_capacity(batch_size);
            let mut ticker = interval(flush_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Some(event) => {
                            batch.push(event);
                            if batch.len() >= batch_size {
                                emit_batch(&*sink, &mut batch).await;
                            }
                        }
                        None => {
                            if !batch.is_empty() {
                                emit_batch(&*sink, &mut batch).await;
                            }
                            if let Err(e) = sink.flush().await {
                                eprintln!("error flushing log sink: {}", e);
                            }
                            break;
                        }
                    },
                    _ = ticker.tick() => {
                        if !batch.is_empty() {
                            emit_batch(&*sink, &mut batch).await;
                        }
                    }
                }
            }
        });

        (Self {
            sender: tx,
            min_level,
            total_events,
            enqueued_events,
            dropped_events,
        }, handle)
    }
}

fn is_ignored_target(target: &str) -> bool {
    IGNORED_TARGETS.iter().any(|prefix| match target.strip_prefix(*prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with("::"),
        None => false,
    })
}

async fn emit_batch(sink: &dyn BatchSink, batch: &mut Vec<LogEvent>) {
    sink.emit_batch(batch).await;
    batch.clear();
}

impl<S> Layer<S> for LogglyLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        let meta = event.metadata();
        if *meta.level() > self.min_level {
            return;
        }
        if is_ignored_target(meta.target()) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut properties = visitor.properties;
        properties.push(LogEventProperty::new(SOURCE_CONTEXT_KEY, meta.target()));

        let template = MessageTemplate::parse_formatted(visitor.message.unwrap_or_default());
        let mut record = LogEvent::new(Utc::now(), (*meta.level()).into(), template, properties);
        record.exception = visitor.exception;

        match self.sender.try_send(record) {
            Ok(()) => {
                self.enqueued_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(_e) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("log channel full, dropping log event");
            }
        }
    }
}

use tracing::field::{Field, Visit};

/// Collects `tracing` fields into [`LogEventProperty`]s.
///
/// The `message` field becomes the template and fields recorded as errors
/// become the event's exception.
#[derive(Default)]
pub struct FieldVisitor {
    pub properties: Vec<LogEventProperty>,
    pub message: Option<String>,
    pub exception: Option<ExceptionInfo>,
}

impl FieldVisitor {
    fn push(&mut self, field: &Field, value: impl Into<PropertyValue>) {
        self.properties.push(LogEventProperty::new(field.name(), value));
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.push(field, value);
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, value);
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, value);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, value);
    }

    /// The first error becomes the event's exception. Only its message and
    /// `source()` chain are captured: the concrete type cannot be recovered
    /// from a `dyn Error`, so `Type` is left unset. Build the event with
    /// [`ExceptionInfo::from_error`] when the type name is needed.
    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        if self.exception.is_none() {
            self.exception = Some(ExceptionInfo::from_dyn_error(value));
        } else {
            self.push(field, value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let text = format!("{:?}", value);
        if field.name() == "message" {
            self.message = Some(text);
        } else {
            self.push(field, text);
        }
    }
}
