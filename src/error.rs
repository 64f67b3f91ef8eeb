//! Error types for sqlroute.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for sqlroute operations.
///
/// Only loading steps can fail. Hint generation and reconciliation are
/// total and never produce one of these.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The schema description could not be read.
    #[error("Schema source {} is unreadable: {source}", display_path(.path))]
    SchemaParse {
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    /// Raw oracle output that is not a decision object.
    #[error("Invalid decision payload: {0}")]
    Decision(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RouterError {
    /// Create a schema error for a source with a known path.
    pub fn schema_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SchemaParse {
            path: Some(path.into()),
            source,
        }
    }

    /// Create a schema error for an anonymous reader.
    pub fn schema_stream(source: std::io::Error) -> Self {
        Self::SchemaParse { path: None, source }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!("'{}'", p.display()),
        None => "<stream>".to_string(),
    }
}

/// Result type alias for sqlroute operations.
pub type RouterResult<T> = Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_schema_error_display() {
        let err = RouterError::schema_file(
            "db_description.txt",
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        );
        assert_eq!(
            err.to_string(),
            "Schema source 'db_description.txt' is unreadable: no such file"
        );
    }

    #[test]
    fn test_stream_error_display() {
        let err = RouterError::schema_stream(io::Error::new(
            io::ErrorKind::InvalidData,
            "stream did not contain valid UTF-8",
        ));
        assert!(err.to_string().starts_with("Schema source <stream>"));
    }
}
