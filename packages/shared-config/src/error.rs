use thiserror::Error;

/// Why configuration could not be loaded
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Variable set but not parseable as the expected type
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),

    /// Values that parse but are out of range
    #[error("invalid configuration: {0}")]
    OutOfRange(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
