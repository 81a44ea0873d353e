//! Error types for the background cache

use std::fmt;

#[derive(Debug)]
pub enum CacheError {
    /// The store could not be opened or migrated
    Init(String),
    /// Image input could not be turned into bytes
    Conversion(String),
    /// A read or write against an open store failed
    Transaction(Box<sqlx::Error>),
    /// Settings could not be read, parsed, or written
    Settings(String),
    Http(Box<reqwest::Error>),
    Fetch(String),
    InvalidSource(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Init(msg) => write!(f, "Store initialization failed: {}", msg),
            CacheError::Conversion(msg) => write!(f, "Image conversion failed: {}", msg),
            CacheError::Transaction(err) => write!(f, "Store transaction failed: {}", err),
            CacheError::Settings(msg) => write!(f, "Settings error: {}", msg),
            CacheError::Http(err) => write!(f, "HTTP error: {}", err),
            CacheError::Fetch(msg) => write!(f, "Fetch error: {}", msg),
            CacheError::InvalidSource(source) => write!(f, "Unknown background source: {}", source),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Transaction(err) => Some(err.as_ref()),
            CacheError::Http(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for CacheError {
    fn from(err: sqlx::Error) -> Self {
        CacheError::Transaction(Box::new(err))
    }
}

impl From<reqwest::Error> for CacheError {
    fn from(err: reqwest::Error) -> Self {
        CacheError::Http(Box::new(err))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Settings(err.to_string())
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Settings(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
