use serde_json::json;
use std::vec;

use crate::payload::event_to_json;
use crate::record::LogEvent;
use crate::selflog::SelfLog;

/// Default bulk ceiling: 4.5 MiB.
pub const MAX_BULK_BYTES: usize = 4_718_592;

pub const CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Event name of the synthetic record appended when diagnostics are on.
pub const DIAGNOSTICS_EVENT: &str = "LogglyDiagnostics";

/// One network-ready request body: newline-joined JSON documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkBody {
    content: String,
}

impl BulkBody {
    pub fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }

    pub fn as_str(&self) -> &str {
        &self.content
    }

    pub fn into_string(self) -> String {
        self.content
    }

    pub fn lines(&self) -> std::str::Split<'_, char> {
        self.content.split('\n')
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Join documents into a body, optionally appending the diagnostics record
/// computed from the documents, byte count and page.
pub fn package_content(
    mut jsons: Vec<String>,
    bytes: usize,
    page: usize,
    include_diagnostics: bool,
) -> BulkBody {
    if include_diagnostics {
        let diagnostic = json!({
            "Event": DIAGNOSTICS_EVENT,
            "Trace": format!(
                "EventCount={}, ByteCount={}, PageCount={}",
                jsons.len(),
                bytes,
                page
            ),
        });
        jsons.push(diagnostic.to_string());
    }
    BulkBody { content: jsons.join("\n") }
}

/// Split a batch of events into bulk bodies.
///
/// `None` yields nothing at all; an empty slice still yields one (possibly
/// empty) body so diagnostics can be shipped.
pub fn chunk_events(
    events: Option<&[LogEvent]>,
    max_bulk_bytes: usize,
    include_diagnostics: bool,
    self_log: &dyn SelfLog,
) -> ChunkEvents {
    match events {
        Some(events) => {
            let jsons = events
                .iter()
                .filter_map(|event| event_to_json(event, self_log))
                .filter(|json| !json.trim().is_empty())
                .collect();
            ChunkEvents::new(jsons, max_bulk_bytes, include_diagnostics)
        }
        None => ChunkEvents::empty(),
    }
}

/// Lazy iterator over the bodies of one batch.
///
/// Documents are serialized up front; bodies are joined as they are pulled.
/// The ceiling is checked before each document is added, so a chunk may
/// overshoot it by one document.
#[derive(Debug)]
pub struct ChunkEvents {
    documents: vec::IntoIter<String>,
    chunk: Vec<String>,
    bytes: usize,
    page: usize,
    max_bulk_bytes: usize,
    include_diagnostics: bool,
    finished: bool,
}

impl ChunkEvents {
    pub fn new(documents: Vec<String>, max_bulk_bytes: usize, include_diagnostics: bool) -> Self {
        ChunkEvents {
            documents: documents.into_iter(),
            chunk: Vec::new(),
            bytes: 0,
            page: 0,
            max_bulk_bytes,
            include_diagnostics,
            finished: false,
        }
    }

    pub fn empty() -> Self {
        let mut chunks = Self::new(Vec::new(), MAX_BULK_BYTES, false);
        chunks.finished = true;
        chunks
    }

    /// Index of the chunk currently being filled.
    pub fn page(&self) -> usize {
        self.page
    }
}

impl Iterator for ChunkEvents {
    type Item = BulkBody;

    fn next(&mut self) -> Option<BulkBody> {
        if self.finished {
            return None;
        }

        for json in self.documents.by_ref() {
            if self.bytes > self.max_bulk_bytes {
                let body = package_content(std::mem::take(&mut self.chunk), self.bytes, self.page, false);
                self.bytes = json.len() + 1;
                self.page += 1;
                self.chunk.push(json);
                return Some(body);
            }
            self.bytes += json.len() + 1;
            self.chunk.push(json);
        }

        self.finished = true;
        Some(package_content(
            std::mem::take(&mut self.chunk),
            self.bytes,
            self.page,
            self.include_diagnostics,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(sizes: &[usize]) -> Vec<String> {
        sizes.iter().map(|n| "x".repeat(*n)).collect()
    }

    #[test]
    fn package_content_appends_diagnostics() {
        let jsons = vec![
            r#"{"fruit":"orange"}"#.to_string(),
            r#"{"fruit":"apple"}"#.to_string(),
            r#"{"fruit":"banana"}"#.to_string(),
        ];
        let bytes = jsons.join("\n").len();

        let plain = package_content(jsons.clone(), bytes, 0, false);
        let with_diag = package_content(jsons, bytes, 0, true);

        assert_eq!(plain.lines().count(), 3);
        assert_eq!(with_diag.lines().count(), 4);
        assert!(!plain.as_str().contains(DIAGNOSTICS_EVENT));
        let last = with_diag.lines().last().unwrap();
        let record: serde_json::Value = serde_json::from_str(last).unwrap();
        assert_eq!(record["Event"], DIAGNOSTICS_EVENT);
        assert_eq!(
            record["Trace"],
            format!("EventCount=3, ByteCount={}, PageCount=0", bytes)
        );
    }

    #[test]
    fn ceiling_is_checked_before_adding() {
        // 5 bytes per document with the separator: 5, 10, 15 never exceeds
        // 10 at the moment of a check until the fourth document.
        let bodies: Vec<_> = ChunkEvents::new(docs(&[4, 4, 4, 4]), 10, false).collect();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0].lines().count(), 3);
        assert_eq!(bodies[1].lines().count(), 1);
    }

    #[test]
    fn three_documents_at_the_ceiling_share_a_chunk() {
        let bodies: Vec<_> = ChunkEvents::new(docs(&[4, 4, 4]), 10, false).collect();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0].as_str(), "xxxx\nxxxx\nxxxx");
    }

    #[test]
    fn oversized_document_ships_alone() {
        let bodies: Vec<_> = ChunkEvents::new(docs(&[50, 3, 3]), 10, true).collect();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0].as_str(), "x".repeat(50));
        // Last page: two documents, 8 bytes, page 1, plus diagnostics.
        assert_eq!(bodies[1].lines().count(), 3);
        assert!(bodies[1]
            .as_str()
            .contains("EventCount=2, ByteCount=8, PageCount=1"));
    }

    #[test]
    fn only_last_chunk_has_diagnostics() {
        let bodies: Vec<_> = ChunkEvents::new(docs(&[20, 20, 20]), 10, true).collect();
        assert_eq!(bodies.len(), 3);
        assert!(!bodies[0].as_str().contains(DIAGNOSTICS_EVENT));
        assert!(!bodies[1].as_str().contains(DIAGNOSTICS_EVENT));
        assert!(bodies[2].lines().last().unwrap().contains(DIAGNOSTICS_EVENT));
        assert!(bodies[2].as_str().contains("PageCount=2"));
    }

    #[test]
    fn byte_count_is_utf8() {
        let documents = vec!["é".to_string(), "é".to_string()];
        let body = ChunkEvents::new(documents, MAX_BULK_BYTES, true).next().unwrap();
        assert!(body.as_str().contains("ByteCount=6"));
    }

    #[test]
    fn empty_documents_yield_one_body() {
        let mut chunks = ChunkEvents::new(Vec::new(), MAX_BULK_BYTES, false);
        let body = chunks.next().unwrap();
        assert!(body.is_empty());
        assert!(chunks.next().is_none());
    }

    #[test]
    fn bodies_are_lazy() {
        let mut chunks = ChunkEvents::new(docs(&[20, 20, 20]), 10, false);
        assert_eq!(chunks.page(), 0);
        chunks.next().unwrap();
        assert_eq!(chunks.page(), 1);
    }

    #[test]
    fn failed_events_are_dropped_and_reported() {
        use crate::record::{Level, LogEventProperty, PropertyValue, StructureValue};
        use crate::selflog::MemorySelfLog;
        use crate::template::MessageTemplate;
        use chrono::Utc;

        let event = |props: Vec<LogEventProperty>| {
            LogEvent::new(Utc::now(), Level::Error, MessageTemplate::parse("m"), props)
        };
        let node = StructureValue::new(None, Vec::new());
        node.poison();
        let events = vec![
            event(vec![LogEventProperty::new("Item", 0)]),
            event(vec![LogEventProperty::new("Node", PropertyValue::Structure(node))]),
            event(vec![LogEventProperty::new("Item", 2)]),
        ];
        let log = MemorySelfLog::new();

        let bodies: Vec<_> = chunk_events(Some(events.as_slice()), MAX_BULK_BYTES, true, &log).collect();
        assert_eq!(bodies.len(), 1);
        let lines: Vec<_> = bodies[0].lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with(r#"{"Item":0,"#));
        assert!(lines[1].starts_with(r#"{"Item":2,"#));
        assert!(lines[2].contains("EventCount=2"));

        let reported = log.lines();
        assert_eq!(reported.len(), 1);
        assert!(reported[0].starts_with("Error extracting json from logEvent"));
    }

    #[test]
    fn content_type_is_json_utf8() {
        let body = package_content(vec!["{}".to_string()], 3, 0, false);
        assert_eq!(body.content_type(), "application/json; charset=utf-8");
    }
}
