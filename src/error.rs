//! Error types for DhruvaDock

use thiserror::Error;

/// DhruvaDock error type
#[derive(Error, Debug)]
pub enum DockError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sensor error: {0}")]
    Sensor(String),

    #[error("Motion sink error: {0}")]
    Sink(String),

    #[error("Mission error: {0}")]
    Mission(String),
}

impl From<toml::de::Error> for DockError {
    fn from(e: toml::de::Error) -> Self {
        DockError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DockError>;
