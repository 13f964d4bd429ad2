use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("Invalid image tag {tag:?}: {reason}")]
    InvalidTag { tag: String, reason: &'static str },

    #[error("Home directory not found while expanding {0}")]
    HomeDirNotFound(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
