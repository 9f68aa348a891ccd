use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WireError>;

/// A dotted path through a message or IR tree, e.g.
/// `sensor_data[0].objects[1].confidence`.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct FieldPath(pub Vec<String>);

impl FieldPath {
    pub fn root() -> FieldPath {
        FieldPath(Vec::new())
    }

    /// Returns a new path with `segment` appended.
    pub fn child(&self, segment: &str) -> FieldPath {
        let mut segments = self.0.clone();
        segments.push(segment.to_owned());
        FieldPath(segments)
    }

    /// Returns a new path pointing at element `index` of the repeated field `name`.
    pub fn element(&self, name: &str, index: usize) -> FieldPath {
        self.child(&format!("{}[{}]", name, index))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.0.join("."))
        }
    }
}

#[derive(Debug, Error)]
pub enum WireError {
    /// Lookup of a type or field the registry does not declare. This is a
    /// contract violation by the caller, never a property of input data.
    #[error("Schema has no definition for {type_name}{}", field.as_ref().map(|f| format!(".{}", f)).unwrap_or_default())]
    SchemaNotFound {
        type_name: String,
        field:     Option<String>,
    },

    #[error("Malformed {type_name} at byte {offset}: {reason}")]
    Malformed {
        offset:    usize,
        type_name: String,
        reason:    String,
    },

    #[error("IR parse error at {path} (line {line}, column {column}): {message}")]
    IrParse {
        path:    FieldPath,
        line:    usize,
        column:  usize,
        message: String,
    },

    #[error("Migration gap: target {type_name} requires \"{field}\" at {path}")]
    MigrationGap {
        type_name: String,
        field:     String,
        path:      FieldPath,
    },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// A schema version name that is not registered, typically from user input.
    #[error("Unknown schema version \"{0}\" (expected v1 or v2)")]
    UnknownVersion(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WireError {
    pub fn type_not_found(type_name: &str) -> WireError {
        WireError::SchemaNotFound {
            type_name: type_name.to_owned(),
            field:     None,
        }
    }

    pub fn field_not_found(type_name: &str, field: &str) -> WireError {
        WireError::SchemaNotFound {
            type_name: type_name.to_owned(),
            field:     Some(field.to_owned()),
        }
    }

    /// IR errors raised after tokenizing, where only the path is known.
    pub fn ir(path: &FieldPath, message: impl Into<String>) -> WireError {
        WireError::IrParse {
            path:    path.clone(),
            line:    0,
            column:  0,
            message: message.into(),
        }
    }

    /// True for programmer errors that callers should not try to recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(self, WireError::SchemaNotFound { .. } | WireError::InvalidSchema(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_path_display() {
        assert_eq!(FieldPath::root().to_string(), "<root>");
        let path = FieldPath::root().element("sensor_data", 0).child("type");
        assert_eq!(path.to_string(), "sensor_data[0].type");
    }

    #[test]
    fn schema_not_found_message() {
        let err = WireError::field_not_found("DetectedObject", "confidence");
        assert_eq!(err.to_string(), "Schema has no definition for DetectedObject.confidence");
        assert!(err.is_fatal());
        let err = WireError::type_not_found("Radar");
        assert_eq!(err.to_string(), "Schema has no definition for Radar");
    }
}
