use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use crate::record::LogEvent;
use crate::selflog::SelfLog;
use crate::simplify::{simplify, PropertyError};

pub const LEVEL_KEY: &str = "Level";
pub const TIMESTAMP_KEY: &str = "Timestamp";
pub const RAW_KEY: &str = "Raw";
pub const EXCEPTION_KEY: &str = "Exception";

/// Insert that never overwrites: the first value written for a key wins.
pub trait AddIfAbsent<K, V> {
    /// Returns `true` if the value was inserted.
    fn add_if_absent(&mut self, key: K, value: V) -> bool;
}

impl<K: Ord, V> AddIfAbsent<K, V> for BTreeMap<K, V> {
    fn add_if_absent(&mut self, key: K, value: V) -> bool {
        if self.contains_key(&key) {
            return false;
        }
        self.insert(key, value);
        true
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> AddIfAbsent<K, V> for HashMap<K, V, S> {
    fn add_if_absent(&mut self, key: K, value: V) -> bool {
        if self.contains_key(&key) {
            return false;
        }
        self.insert(key, value);
        true
    }
}

impl AddIfAbsent<String, Value> for Map<String, Value> {
    fn add_if_absent(&mut self, key: String, value: Value) -> bool {
        if self.contains_key(&key) {
            return false;
        }
        self.insert(key, value);
        true
    }
}

/// Error produced while turning a [`LogEvent`] into a JSON document.
#[derive(thiserror::Error, Debug)]
pub enum SerializeError {
    #[error("property `{key}` could not be simplified: {source}")]
    Property {
        key: String,
        #[source]
        source: PropertyError,
    },

    #[error("message could not be rendered: {0}")]
    Render(#[source] PropertyError),

    #[error("payload could not be encoded: {0}")]
    Json(#[from] serde_json::Error),
}

/// Keys that parse as a 32-bit signed integer are positional template
/// arguments. Wider numeric keys are kept as named properties.
pub fn is_positional_key(key: &str) -> bool {
    key.parse::<i32>().is_ok()
}

/// Strip characters that ingestion treats as field separators.
pub fn normalize_key(key: &str) -> String {
    key.chars().filter(|c| !matches!(c, ' ' | ':' | '-' | '_')).collect()
}

/// Serialize an event into one flat JSON object.
///
/// Failures are written to `self_log` and the event is dropped.
pub fn event_to_json(event: &LogEvent, self_log: &dyn SelfLog) -> Option<String> {
    match try_event_to_json(event) {
        Ok(json) => Some(json),
        Err(e) => {
            self_log.write_line(&format!("Error extracting json from logEvent {}", e));
            None
        }
    }
}

pub fn try_event_to_json(event: &LogEvent) -> Result<String, SerializeError> {
    let mut payload = Map::new();

    for prop in &event.properties {
        if is_positional_key(&prop.name) {
            continue;
        }
        let simple = simplify(&prop.value).map_err(|source| SerializeError::Property {
            key: prop.name.clone(),
            source,
        })?;
        payload.add_if_absent(normalize_key(&prop.name), simple);
    }

    payload.add_if_absent(LEVEL_KEY.to_string(), Value::String(event.level.to_string()));
    payload.add_if_absent(TIMESTAMP_KEY.to_string(), serde_json::to_value(event.timestamp)?);
    let raw = event.render_message().map_err(SerializeError::Render)?;
    payload.add_if_absent(RAW_KEY.to_string(), Value::String(raw));

    if let Some(exception) = &event.exception {
        payload.add_if_absent(EXCEPTION_KEY.to_string(), serde_json::to_value(exception)?);
    }

    Ok(serde_json::to_string(&payload)?)
}
