//! Error types for segmesh

use thiserror::Error;

/// Main error type for segmesh operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),
}

/// Result type alias for segmesh operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidGrid("width must be positive".to_string());
        assert_eq!(format!("{err}"), "Invalid grid: width must be positive");

        let err = Error::InvalidConfig("target_subdivisions = 0".to_string());
        assert!(format!("{err}").contains("target_subdivisions"));
    }
}
