use thiserror::Error;

/// Errors from parsing addresses and hashes out of text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid hex length: expected {expected} hex chars, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid hex encoding: {0}")]
    InvalidHex(String),
}

pub type Result<T> = std::result::Result<T, ParseError>;
