use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::error::Error;
use std::sync::Arc;

use crate::chunk::{chunk_events, BulkBody, ChunkEvents};
use crate::config::LogglyConfig;
use crate::record::LogEvent;
use crate::selflog::{SelfLog, TracingSelfLog};
use crate::sink::BatchSink;

/// Loggly implementation of [`BatchSink`] using the HTTP bulk endpoint.
///
/// Every batch is split into size-bounded chunks and each chunk is posted
/// as one request, strictly in order. A failed chunk is reported to the
/// self-log and skipped; the remaining chunks are still sent.
#[derive(Clone)]
pub struct LogglySink {
    client: Client,
    url: String,
    config: LogglyConfig,
    self_log: Arc<dyn SelfLog>,
}

impl LogglySink {
    /// Construct a sink that reports failures through `tracing`.
    ///
    /// **Parameters**
    /// - `config`: [`LogglyConfig`] describing key, tags, host and chunking.
    ///
    /// **Returns**
    /// - A ready-to-use [`LogglySink`] that can be passed into
    ///   [`init_tracing`](crate::init::init_tracing).
    pub fn new(config: LogglyConfig) -> Self {
        Self::with_self_log(config, Arc::new(TracingSelfLog))
    }

    /// Construct a sink with an explicit diagnostics channel.
    pub fn with_self_log(config: LogglyConfig, self_log: Arc<dyn SelfLog>) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                self_log.write_line(&format!("falling back to default HTTP client: {}", e));
                Client::new()
            });
        let url = config.bulk_url();
        Self { client, url, config, self_log }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn config(&self) -> &LogglyConfig {
        &self.config
    }

    /// Chunk `events` with this sink's ceiling and diagnostics setting.
    pub fn chunk_events(&self, events: Option<&[LogEvent]>) -> ChunkEvents {
        chunk_events(
            events,
            self.config.max_bulk_bytes,
            self.config.include_diagnostics,
            &*self.self_log,
        )
    }

    /// Post every chunk of `events`, in order. `None` sends nothing.
    pub async fn emit(&self, events: Option<&[LogEvent]>) {
        for body in self.chunk_events(events) {
            if let Err(e) = self.post(body).await {
                self.self_log
                    .write_line(&format!("Exception posting to loggly {}", e));
            }
        }
    }

    async fn post(&self, body: BulkBody) -> Result<(), Box<dyn Error + Send + Sync>> {
        let resp = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, body.content_type())
            .body(body.into_string())
            .send()
            .await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(format!("Loggly bulk upload failed with status {}: {}", status, text).into())
        }
    }
}

#[async_trait]
impl BatchSink for LogglySink {
    async fn emit_batch(&self, events: &[LogEvent]) {
        self.emit(Some(events)).await
    }
}
