use thiserror::Error;

/// Error type shared by every dbmq crate.
///
/// Resolution, matching and delivery errors are per-event: bridge loops log
/// them and move on to the next event. `Config` and `Connection` only occur
/// during startup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("key '{key}' not found in mapping")]
    KeyNotFound { key: String },

    #[error("index {index} out of range for sequence of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid index '{0}': expected a non-negative integer literal")]
    InvalidIndexSyntax(String),

    #[error("field '{field}' not found in record")]
    FieldNotFound { field: String },

    #[error("cannot access field '{field}' on a {found} value")]
    NotARecord { field: String, found: &'static str },

    #[error("cannot look up key '{key}' on a {found} value")]
    NotAMapping { key: String, found: &'static str },

    #[error("cannot take index [{index}] of a {found} value")]
    NotASequence { index: usize, found: &'static str },

    #[error("invalid path expression '{expression}': {reason}")]
    InvalidPathSyntax { expression: String, reason: String },

    #[error("no mapping matches {0}")]
    NoMappingMatch(String),

    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("invalid bus argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("connection error: {0}")]
    Connection(String),
}
