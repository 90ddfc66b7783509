//! Debug logging for termdeck
//!
//! Two entry points share one log file:
//! - The `log` facade, installed by [`init_log_bridge`]. Every `log::info!`
//!   and friends in the crate lands here.
//! - Category-tagged `debug_info!` / `debug_log!` macros, controlled by the
//!   `DEBUG_LEVEL` environment variable:
//!   - 0 or unset: No debugging
//!   - 1: Errors only
//!   - 2: Info level (session lifecycle, window routing)
//!   - 3: Debug level (batching, chord state)
//!   - 4: Trace level (every operation)
//!
//! All output goes to /tmp/termdeck_debug.log on Unix/macOS,
//! or %TEMP%\termdeck_debug.log on Windows. The file is only created once
//! something is written to it.

use log::{LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// Debug level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugLevel {
    Off = 0,
    Error = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl DebugLevel {
    fn from_env() -> Self {
        match std::env::var("DEBUG_LEVEL") {
            Ok(val) => match val.trim().parse::<u8>() {
                Ok(1) => DebugLevel::Error,
                Ok(2) => DebugLevel::Info,
                Ok(3) => DebugLevel::Debug,
                Ok(4) => DebugLevel::Trace,
                _ => DebugLevel::Off,
            },
            Err(_) => DebugLevel::Off,
        }
    }
}

pub fn log_path() -> PathBuf {
    #[cfg(unix)]
    let path = PathBuf::from("/tmp/termdeck_debug.log");
    #[cfg(windows)]
    let path = std::env::temp_dir().join("termdeck_debug.log");
    path
}

/// Global debug logger
struct DebugLogger {
    level: DebugLevel,
    file: Option<std::fs::File>,
    /// Opening failed once; don't retry on every line
    open_failed: bool,
}

impl DebugLogger {
    fn new() -> Self {
        DebugLogger {
            level: DebugLevel::from_env(),
            file: None,
            open_failed: false,
        }
    }

    fn ensure_open(&mut self) -> bool {
        if self.file.is_some() {
            return true;
        }
        if self.open_failed {
            return false;
        }
        match OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(log_path())
        {
            Ok(mut f) => {
                let _ = write!(
                    f,
                    "\n{}\ntermdeck debug session started at {} (level={:?})\n{}\n",
                    "=".repeat(80),
                    timestamp(),
                    self.level,
                    "=".repeat(80)
                );
                self.file = Some(f);
                true
            }
            Err(_) => {
                // Logging must never take the process down
                self.open_failed = true;
                false
            }
        }
    }

    fn write_raw(&mut self, msg: &str) {
        if !self.ensure_open() {
            return;
        }
        if let Some(ref mut file) = self.file {
            let _ = file.write_all(msg.as_bytes());
            let _ = file.flush();
        }
    }

    fn log(&mut self, level: DebugLevel, category: &str, msg: &str) {
        if level <= self.level {
            let level_str = match level {
                DebugLevel::Error => "ERROR",
                DebugLevel::Info => "INFO ",
                DebugLevel::Debug => "DEBUG",
                DebugLevel::Trace => "TRACE",
                DebugLevel::Off => return,
            };
            self.write_raw(&format!(
                "[{}] [{}] [{}] {}\n",
                timestamp(),
                level_str,
                category,
                msg
            ));
        }
    }
}

static LOGGER: OnceLock<Mutex<DebugLogger>> = OnceLock::new();

fn get_logger() -> &'static Mutex<DebugLogger> {
    LOGGER.get_or_init(|| Mutex::new(DebugLogger::new()))
}

fn timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%d %H:%M:%S%.6f")
        .to_string()
}

/// Check if debugging is enabled at given level
pub fn is_enabled(level: DebugLevel) -> bool {
    let logger = get_logger().lock();
    level <= logger.level
}

/// Log a message at specified level
pub fn log(level: DebugLevel, category: &str, msg: &str) {
    let mut logger = get_logger().lock();
    logger.log(level, category, msg);
}

/// Log formatted message
pub fn logf(level: DebugLevel, category: &str, args: fmt::Arguments) {
    if is_enabled(level) {
        log(level, category, &format!("{}", args));
    }
}

// ============================================================================
// `log` facade bridge
// ============================================================================

/// Set once the CLI or `RUST_LOG` picked a level; the config level is then
/// ignored
static LEVEL_PINNED: AtomicBool = AtomicBool::new(false);

struct LogBridge {
    mirror_stderr: bool,
}

impl Log for LogBridge {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "[{}] [{:<5}] [{}] {}\n",
            timestamp(),
            record.level(),
            record.target(),
            record.args()
        );
        get_logger().lock().write_raw(&line);
        if self.mirror_stderr {
            eprint!("{}", line);
        }
    }

    fn flush(&self) {}
}

fn parse_level(value: &str) -> Option<LevelFilter> {
    value.trim().parse::<LevelFilter>().ok()
}

/// Route the `log` facade to the debug log file.
///
/// Level precedence: `cli_level`, then `RUST_LOG`, then the config level
/// applied later through [`apply_config_level`]. Output is mirrored to
/// stderr when `RUST_LOG` is set. Calling this more than once is harmless.
pub fn init_log_bridge(cli_level: Option<LevelFilter>) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let env_level = rust_log.as_deref().and_then(parse_level);

    let level = match cli_level.or(env_level) {
        Some(level) => {
            LEVEL_PINNED.store(true, Ordering::SeqCst);
            level
        }
        None => LevelFilter::Info,
    };

    let bridge = LogBridge {
        mirror_stderr: rust_log.is_some(),
    };
    if log::set_boxed_logger(Box::new(bridge)).is_ok() {
        log::set_max_level(level);
    }
}

/// Apply the configured `log_level` unless the CLI or environment already
/// chose one. Unknown names are reported and ignored.
pub fn apply_config_level(config_level: &str) {
    if LEVEL_PINNED.load(Ordering::SeqCst) {
        return;
    }
    match parse_level(config_level) {
        Some(level) => log::set_max_level(level),
        None => log::warn!("Unknown log level in config: {:?}", config_level),
    }
}

// Convenience macros for logging
#[macro_export]
macro_rules! debug_error {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Error, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_info {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Info, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_log {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Debug, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_trace {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Trace, $category, format_args!($($arg)*))
    };
}
