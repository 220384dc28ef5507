//! Logging setup on top of `log4rs`. The library itself only uses the `log` facade.

use crate::cache::SWEEP_LOG_TARGET;
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

pub const ENV_LOG_DIR: &str = "GLOBALCACHE_LOG_DIR";
pub const ENV_LOG_LEVEL: &str = "GLOBALCACHE_LOG_LEVEL";
pub const ENV_LOG_RETENTION: &str = "GLOBALCACHE_LOG_RETENTION";

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;

/// Maps `error|warn|info|debug|trace|off` to a filter; anything else is `Info`.
#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Initializes logging from a log4rs YAML file.
///
/// # Errors
/// Returns an error if the file is unreadable or a logger is already installed.
pub fn init_from_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    log4rs::init_file(path, log4rs::config::Deserializers::default())?;
    Ok(())
}

/// Logs to stderr. Used by the CLI.
///
/// # Errors
/// Returns an error if a logger is already installed.
pub fn init_console(level: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let lvl = parse_level(level.unwrap_or("warn"));
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(lvl))?;
    log4rs::init_config(config)?;
    Ok(())
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    let roller =
        FixedWindowRoller::builder().build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    let appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))?;
    Ok(appender)
}

/// Configures process-wide logging into `dir` (current directory if `None`):
/// - `app.log`: everything except sweep activity
/// - `sweep.log`: the `globalcache::sweep` target (evictions, refreshes, refresh failures)
///
/// `retention` is the number of rolled files kept per log (default 7).
///
/// # Errors
/// Returns an error if the directory or appenders cannot be created, or a logger is already installed.
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let base = dir
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    std::fs::create_dir_all(&base)?;
    let keep = u32::try_from(retention.unwrap_or(7)).unwrap_or(u32::MAX);
    let lvl = parse_level(level.unwrap_or("info"));

    let config = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "app", keep)?)))
        .appender(Appender::builder().build("sweep", Box::new(rolling(&base, "sweep", keep)?)))
        .logger(Logger::builder().appender("sweep").additive(false).build(SWEEP_LOG_TARGET, lvl))
        .build(Root::builder().appender("app").build(lvl))?;
    log4rs::init_config(config)?;
    Ok(())
}

/// Configures logging from `GLOBALCACHE_LOG_DIR`, `GLOBALCACHE_LOG_LEVEL` and
/// `GLOBALCACHE_LOG_RETENTION`.
///
/// # Errors
/// As [`configure_logging`].
pub fn configure_from_env() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::var(ENV_LOG_DIR).ok().map(PathBuf::from);
    let level = std::env::var(ENV_LOG_LEVEL).ok();
    let retention = std::env::var(ENV_LOG_RETENTION).ok().and_then(|s| s.parse::<usize>().ok());
    configure_logging(dir.as_deref(), level.as_deref(), retention)
}
