//! Error types for the WPILOG analyzer.

use thiserror::Error;

/// Result type alias for WPILOG operations.
pub type Result<T> = std::result::Result<T, WpilogError>;

/// Errors that can occur while decoding WPILOG data or compiling struct schemas.
#[derive(Error, Debug)]
pub enum WpilogError {
    /// The file is not a WPILOG stream, or its version is below the minimum supported.
    #[error("invalid WPILOG header: {0}")]
    InvalidLogHeader(String),

    /// I/O error occurred while reading a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Entry not found or invalid entry ID.
    #[error("invalid entry: {0}")]
    InvalidEntry(String),

    /// A data record's payload did not match the byte shape its declared type requires.
    #[error("malformed payload for entry {entry} (declared type {type_name}): {reason}")]
    MalformedPayload {
        entry: u32,
        type_name: String,
        reason: String,
    },

    /// A struct has not been compiled (or does not exist) when decoding was attempted.
    #[error("schema missing: {0}")]
    SchemaMissing(String),

    /// A schema failed to compile (invalid grammar, or a reference that never resolves).
    #[error("schema error: {0}")]
    SchemaError(String),

    /// A control or data record was structurally invalid (bad framing, truncated strings).
    #[error("parse error: {0}")]
    ParseError(String),

    /// An analysis query targeted a field whose type is not `String | Boolean | Number`.
    #[error("unsupported field type for analysis: {0}")]
    UnsupportedFieldType(String),

    /// The JSON analysis configuration could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParseError(String),

    /// UTF-8 decoding error.
    #[error("UTF-8 error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}
