//! Error types for GroupGuard.
//!
//! The guard engine itself has no error path: misconfiguration degrades to
//! "rule contributes no constraint". These types cover the I/O around it.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Errors reported by the chat transport collaborator.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to delete message {message_id} in {chat_id}: {reason}")]
    DeleteFailed {
        chat_id: String,
        message_id: String,
        reason: String,
    },

    #[error("Failed to send message to {to}: {reason}")]
    SendFailed { to: String, reason: String },

    #[error("Failed to fetch group metadata for {chat_id}: {reason}")]
    MetadataFailed { chat_id: String, reason: String },
}

/// Group policy file errors.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Failed to read policy file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse policy file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_errors_convert_into_top_level_error() {
        let err: Error = ConfigError::InvalidValue {
            key: "GROUPGUARD_PATTERN_CACHE_KEY".into(),
            message: "expected 'length' or 'content'".into(),
        }
        .into();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().starts_with("Configuration error: Invalid configuration value"));

        let err: Error = DatabaseError::Migration("V1".into()).into();
        assert_eq!(err.to_string(), "Database error: Migration failed: V1");

        let err: Error = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken").into();
        assert!(matches!(err, Error::Io(_)));
    }
}
