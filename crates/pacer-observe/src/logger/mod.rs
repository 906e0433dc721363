mod config;
mod error;
mod log;
mod object;

pub use config::LoggerConfig;
pub use error::{LoggerError, LoggerResult};
pub use object::{LoggerFormat, LoggerLevel, UtcRfc3339};

/// Installs the global tracing subscriber described by `cfg`.
///
/// Call once, early in `main`. Every later call fails with
/// [`LoggerError::AlreadyInitialized`].
///
/// ```no_run
/// use pacer_observe::{LoggerConfig, LoggerLevel, init_logger};
///
/// let cfg = LoggerConfig::default().with_level(LoggerLevel::new("pacer_core=debug,info")?);
/// init_logger(&cfg)?;
/// tracing::info!("logger ready");
/// # Ok::<(), pacer_observe::LoggerError>(())
/// ```
pub fn init_logger(cfg: &LoggerConfig) -> LoggerResult<()> {
    match cfg.format {
        LoggerFormat::Text => log::logger_text(cfg),
        LoggerFormat::Json => log::logger_json(cfg),
        LoggerFormat::Journald => log::logger_journald(cfg),
    }
}
