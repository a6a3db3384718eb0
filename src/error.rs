//! Error types for nestrie.

use thiserror::Error;

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error type.
///
/// Every failure is synchronous and final: the data structure is
/// deterministic, so nothing is retried internally.
#[derive(Error, Debug)]
pub enum Error {
    /// Rejected build input: empty keyset, duplicate key, or an
    /// out-of-range configuration value.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A serialized image failed validation: bad magic, inconsistent
    /// vector counters, truncation, or an over-wide packed vector.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// Underlying read/write/map failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A key id outside `[0, num_keys)` was given to reverse lookup.
    #[error("key id out of range: {id} (num_keys = {num_keys})")]
    OutOfRange {
        /// The offending id.
        id: usize,
        /// Number of keys in the dictionary.
        num_keys: usize,
    },

    /// A query was issued against a facade that holds no dictionary.
    #[error("trie is not built or loaded")]
    NotBuilt,
}

impl Error {
    /// Create an invalid-input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create an invalid-format error.
    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Error::InvalidFormat(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::invalid_format("bad magic");
        assert_eq!(err.to_string(), "invalid format: bad magic");

        let err = Error::OutOfRange {
            id: 9,
            num_keys: 3,
        };
        assert_eq!(err.to_string(), "key id out of range: 9 (num_keys = 3)");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
