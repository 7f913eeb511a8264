use chrono::{DateTime, Utc};
use serde::Serialize;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::simplify::PropertyError;
use crate::template::MessageTemplate;

/// Severity of a [`LogEvent`].
///
/// `Display` yields the names shipped in the reserved `Level` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Verbose,
    Debug,
    Information,
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Verbose => "Verbose",
            Level::Debug => "Debug",
            Level::Information => "Information",
            Level::Warning => "Warning",
            Level::Error => "Error",
            Level::Fatal => "Fatal",
        };
        f.write_str(name)
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Verbose,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Information,
            tracing::Level::WARN => Level::Warning,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Leaf value of a property.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => f.write_str("null"),
            ScalarValue::Bool(v) => write!(f, "{}", v),
            ScalarValue::Int(v) => write!(f, "{}", v),
            ScalarValue::UInt(v) => write!(f, "{}", v),
            ScalarValue::Float(v) => write!(f, "{}", v),
            ScalarValue::String(v) => f.write_str(v),
        }
    }
}

macro_rules! scalar_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ScalarValue {
                fn from(value: $ty) -> Self {
                    ScalarValue::$variant(value.into())
                }
            }

            impl From<$ty> for PropertyValue {
                fn from(value: $ty) -> Self {
                    PropertyValue::Scalar(value.into())
                }
            }
        )*
    };
}

scalar_from!(
    bool => Bool,
    i8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => UInt,
    u16 => UInt,
    u32 => UInt,
    u64 => UInt,
    f32 => Float,
    f64 => Float,
    &str => String,
    String => String,
);

/// Structured value attached to a property name.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    Scalar(ScalarValue),
    Sequence(Vec<PropertyValue>),
    /// Shared by reference so the same structure may appear more than once
    /// in a graph, including inside itself.
    Structure(Arc<StructureValue>),
    Dictionary(Vec<(ScalarValue, PropertyValue)>),
}

impl PropertyValue {
    pub fn structure(type_tag: Option<&str>, properties: Vec<LogEventProperty>) -> Self {
        PropertyValue::Structure(StructureValue::new(type_tag, properties))
    }
}

impl From<ScalarValue> for PropertyValue {
    fn from(value: ScalarValue) -> Self {
        PropertyValue::Scalar(value)
    }
}

/// An object-like value with an optional type tag.
///
/// Properties live behind a lock so a producer can keep attaching values
/// after the structure has been shared.
pub struct StructureValue {
    type_tag: Option<String>,
    properties: RwLock<Vec<LogEventProperty>>,
}

impl StructureValue {
    pub fn new(type_tag: Option<&str>, properties: Vec<LogEventProperty>) -> Arc<Self> {
        Arc::new(StructureValue {
            type_tag: type_tag.map(str::to_string),
            properties: RwLock::new(properties),
        })
    }

    pub fn type_tag(&self) -> Option<&str> {
        self.type_tag.as_deref()
    }

    /// Append a property to the structure.
    pub fn push(&self, property: LogEventProperty) -> Result<(), PropertyError> {
        self.properties
            .write()
            .map_err(|_| PropertyError::Poisoned)?
            .push(property);
        Ok(())
    }

    /// Snapshot of the current properties, in insertion order.
    pub fn properties(&self) -> Result<Vec<LogEventProperty>, PropertyError> {
        self.properties
            .read()
            .map(|props| props.clone())
            .map_err(|_| PropertyError::Poisoned)
    }

    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = self.properties.write();
            panic!("poisoning structure lock");
        }));
    }
}

// Hand-written so a self-referencing structure does not recurse forever.
impl fmt::Debug for StructureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.properties.read().map(|p| p.len()).ok();
        f.debug_struct("StructureValue")
            .field("type_tag", &self.type_tag)
            .field("properties", &len)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct LogEventProperty {
    pub name: String,
    pub value: PropertyValue,
}

impl LogEventProperty {
    pub fn new(name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        LogEventProperty { name: name.into(), value: value.into() }
    }
}

/// Error payload carried by an event, shipped under the `Exception` key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExceptionInfo {
    #[serde(rename = "Type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_exception: Option<Box<ExceptionInfo>>,
}

impl ExceptionInfo {
    pub fn new(message: impl Into<String>) -> Self {
        ExceptionInfo {
            type_name: None,
            message: message.into(),
            stack_trace: None,
            inner_exception: None,
        }
    }

    /// Capture `err` and its `source()` chain. The outermost entry records
    /// the concrete type name.
    pub fn from_error<E: Error + 'static>(err: &E) -> Self {
        let mut info = Self::from_dyn_error(err);
        info.type_name = Some(std::any::type_name::<E>().to_string());
        info
    }

    /// Capture a type-erased error. `type_name` stays `None` for every
    /// entry since a trait object does not expose its concrete type.
    pub fn from_dyn_error(err: &(dyn Error + 'static)) -> Self {
        ExceptionInfo {
            type_name: None,
            message: err.to_string(),
            stack_trace: None,
            inner_exception: err.source().map(|src| Box::new(Self::from_dyn_error(src))),
        }
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }
}

/// A single structured log event handed to the sink.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub template: MessageTemplate,
    /// Properties in capture order.
    pub properties: Vec<LogEventProperty>,
    pub exception: Option<ExceptionInfo>,
}

impl LogEvent {
    pub fn new(
        timestamp: DateTime<Utc>,
        level: Level,
        template: MessageTemplate,
        properties: Vec<LogEventProperty>,
    ) -> Self {
        LogEvent { timestamp, level, template, properties, exception: None }
    }

    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    /// Template text with property values substituted.
    pub fn render_message(&self) -> Result<String, PropertyError> {
        self.template.render(&self.properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("connection refused")]
    struct Refused;

    #[derive(Debug, thiserror::Error)]
    #[error("upload failed")]
    struct UploadFailed(#[source] Refused);

    #[test]
    fn level_names_match_wire_format() {
        assert_eq!(Level::Information.to_string(), "Information");
        assert_eq!(Level::from(tracing::Level::WARN), Level::Warning);
        assert_eq!(Level::from(tracing::Level::TRACE), Level::Verbose);
        assert!(Level::Fatal > Level::Error);
    }

    #[test]
    fn exception_walks_source_chain() {
        let info = ExceptionInfo::from_error(&UploadFailed(Refused));
        assert_eq!(info.message, "upload failed");
        assert!(info.type_name.unwrap().ends_with("UploadFailed"));
        let inner = info.inner_exception.unwrap();
        assert_eq!(inner.message, "connection refused");
        assert!(inner.inner_exception.is_none());
    }

    #[test]
    fn structure_accepts_late_properties() {
        let structure = StructureValue::new(Some("User"), vec![LogEventProperty::new("id", 7)]);
        structure.push(LogEventProperty::new("name", "ada")).unwrap();
        let props = structure.properties().unwrap();
        assert_eq!(props.len(), 2);
        assert_eq!(props[1].name, "name");
        assert_eq!(structure.type_tag(), Some("User"));
    }
}
