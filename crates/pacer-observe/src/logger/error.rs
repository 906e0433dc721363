use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log format '{0}' (expected text, json or journald)")]
    InvalidFormat(String),

    #[error("invalid log filter: {0}")]
    InvalidLevel(String),

    #[error("journald output is only available on linux")]
    JournaldNotSupported,

    #[error("journald layer failed: {0}")]
    JournaldInitFailed(String),

    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

pub type LoggerResult<T> = Result<T, LoggerError>;
