//! Logger setup for the follower executables
//!
//! Records go to two outputs: the terminal, with coloured level tags, and the session log file,
//! which is kept free of colour codes so it can be searched and diffed.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use log::{self, info, Record};
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Log target of the follower library, whose modules are all below it.
pub const FOLLOWER_TARGET: &str = "follow_lib";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a log level less than `INFO`, found `{0}`")]
    InvalidMinLogLevel(log::LevelFilter),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// `min_level` must be at least `Info`. Must only be called once.
///
/// `targets` overrides the level of particular log targets (module paths), for instance
/// `(FOLLOWER_TARGET, LevelFilter::Trace)` to trace the follower only.
pub fn logger_init(
    min_level: LevelFilter,
    targets: &[(&'static str, LevelFilter)],
    session: &session::Session
) -> Result<(), LoggerInitError> {

    if min_level < log::Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level))
    }

    let log_file = fern::log_file(session.log_file_path.clone())
        .map_err(LoggerInitError::LogFileInitError)?;

    let terminal = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{:10.6} {}] {}{}",
                session::get_elapsed_seconds(),
                level_to_str(record.level()),
                target_prefix(record),
                message
            ))
        })
        .chain(std::io::stdout());

    let file = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{:10.6} {:5}] {}{}",
                session::get_elapsed_seconds(),
                record.level(),
                target_prefix(record),
                message
            ))
        })
        .chain(log_file);

    let dispatch = targets
        .iter()
        .fold(fern::Dispatch::new().level(min_level), |d, (target, level)| {
            d.level_for(*target, *level)
        });

    dispatch
        .chain(terminal)
        .chain(file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    if let Some(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    Log level: {:?}", min_level);
    for (target, level) in targets {
        info!("    Log level for {}: {:?}", target, level);
    }
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Debug and trace records name the module they come from, others don't.
fn target_prefix(record: &Record) -> String {
    if record.level() > log::Level::Info {
        format!("{}: ", short_target(record.target()))
    }
    else {
        String::new()
    }
}

/// Drop the crate name from a target, `follow_lib::supervisor::checks` becomes
/// `supervisor::checks`.
fn short_target(target: &str) -> &str {
    match target.find("::") {
        Some(i) => &target[i + 2..],
        None => target
    }
}

/// Get the string representation of a log level
fn level_to_str(level: log::Level) -> ColoredString {
    match level {
        log::Level::Trace => "TRC".dimmed().italic(),
        log::Level::Debug => "DBG".dimmed(),
        log::Level::Info  => "INF".normal(),
        log::Level::Warn  => "WRN".yellow(),
        log::Level::Error => "ERR".red().bold()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_short_target() {
        assert_eq!(short_target("follow_lib::supervisor::checks"), "supervisor::checks");
        assert_eq!(short_target("follow_lib"), "follow_lib");
        assert_eq!(short_target("follow_exec::sim"), "sim");
    }
}
