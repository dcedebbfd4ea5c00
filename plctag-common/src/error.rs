use config::ConfigError;
use thiserror::Error;

pub type CommonResult<T, E = CommonError> = Result<T, E>;

#[derive(Error, Debug)]
pub enum CommonError {
    #[error("{0}")]
    ConfigError(#[from] ConfigError),
    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),
    #[error("Logger error: {0}")]
    LoggerError(String),
}
