use thiserror::Error;

/// Syntax errors. Parsing stops at the first one.
#[derive(Debug, Error, PartialEq, Clone)]
pub enum ParseError {
    #[error("Expected {expected}, got {found} at token {index}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
        index: usize,
    },
    #[error("Expected expression, got {found} at token {index}")]
    ExpectedExpression { found: String, index: usize },
    #[error("Token stream ended at token {index} without an end-of-input marker")]
    MissingEndOfInput { index: usize },
}

impl ParseError {
    /// Index of the token the parser was looking at when it gave up.
    pub fn index(&self) -> usize {
        match self {
            ParseError::UnexpectedToken { index, .. }
            | ParseError::ExpectedExpression { index, .. }
            | ParseError::MissingEndOfInput { index } => *index,
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
