//! Error types for lidar-io

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// lidar-io error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Incomplete or unterminated frame
    ///
    /// Only used for logging inside the frame decoder; never handed to callers.
    #[error("Framing error: {0}")]
    Framing(String),

    /// Well-framed but malformed payload (missing token, wrong field count)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Transport failure (refused, reset, closed)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Driver operation attempted without an open connection
    #[error("Not connected")]
    NotConnected,

    /// Invalid configuration (rejected scan window, bad config file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Config file parse error
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Unknown simulated sensor id
    #[error("Unknown sensor: {0}")]
    UnknownSensor(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
