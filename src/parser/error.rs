use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected byte '{character}' at position {position}")]
    UnexpectedByte { position: usize, character: char },

    #[error("Unterminated quoted value starting at position {position}")]
    UnterminatedQuote { position: usize },

    #[error("Unable to locate value tuple")]
    MissingValue,

    #[error("Unable to parse float from '{input}'")]
    NoNumber { input: String },

    #[error("Invalid number '{input}': {reason}")]
    InvalidNumber { input: String, reason: String },
}

impl ParseError {
    /// Decode failures reject the whole line; extraction failures only
    /// reject the metric derived from it.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            ParseError::UnexpectedByte { .. } | ParseError::UnterminatedQuote { .. }
        )
    }
}
