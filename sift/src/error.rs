//! Error types for filter and ordering compilation.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Lexical error at offset {offset}: {message}")]
    Lex { offset: usize, message: String },

    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("Mapping '{0}' not found")]
    MappingNotFound(String),

    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn lex(offset: usize, message: impl Into<String>) -> Self {
        Error::Lex {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        Error::Syntax {
            position,
            message: message.into(),
        }
    }

    /// True for the error kinds `ignore_unmapped_fields` is allowed to recover.
    pub fn is_mapping_not_found(&self) -> bool {
        matches!(self, Error::MappingNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
