//! Error types for the lpec-protocol crate.

/// Errors produced while parsing a single LPEC line.
///
/// All of these are recoverable: a malformed line says nothing about the
/// lines that follow it, so callers are expected to log and keep reading.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    /// The line was empty or contained only whitespace
    #[error("empty line")]
    EmptyLine,

    /// The line did not start with a known protocol keyword
    #[error("unrecognized line keyword: {0}")]
    UnknownKeyword(String),

    /// An `EVENT` line had no sequence number
    #[error("EVENT line is missing a sequence number")]
    MissingSequence,

    /// The sequence number was not a valid unsigned integer
    #[error("invalid sequence number: {0}")]
    InvalidSequence(String),

    /// The line had a keyword but no service identifier
    #[error("missing service identifier")]
    MissingService,

    /// A variable assignment did not follow the `name="value"` shape
    #[error("malformed variable assignment near: {0}")]
    MalformedAssignment(String),

    /// A quoted value was opened but never closed
    #[error("unterminated quoted value for variable: {0}")]
    UnterminatedValue(String),
}

/// Convenience type alias for Results using ParseError.
pub type Result<T> = std::result::Result<T, ParseError>;
