//! Per-record error taxonomy. None of these abort a run: the offending line is
//! counted and skipped. I/O failures go through `anyhow` and are fatal.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    /// Line is not valid UTF-8.
    #[error("line is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// Line is not valid JSON.
    #[error("line is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Line parsed, but is not a JSON object.
    #[error("line is not a JSON object")]
    NotAnObject,

    /// Root post has no usable `id_str`.
    #[error("post record has no id")]
    MissingId,

    /// Projected attributes could not be decoded into the typed record even
    /// after omitting every mistyped field.
    #[error("{kind} {id}: {source}")]
    Schema {
        kind: &'static str,
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

impl RecordError {
    /// Short label used in counters and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            RecordError::Encoding(_) => "encoding",
            RecordError::Parse(_) => "parse",
            RecordError::NotAnObject => "not_object",
            RecordError::MissingId => "missing_id",
            RecordError::Schema { .. } => "schema",
        }
    }
}
