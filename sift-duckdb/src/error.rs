//! Error types for the DuckDB backend.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] sift::Error),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

pub type Result<T> = std::result::Result<T, Error>;
