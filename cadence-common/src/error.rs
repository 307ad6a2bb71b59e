//! Common error types for cadence

use thiserror::Error;

/// Common result type for cadence operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across cadence crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A song URI could not be mapped to a playable location
    #[error("Cannot map URI: {0}")]
    UriMapping(String),
}
