// logging.rs — `log` facade backed by simplelog.
//
// Records go to a log file next to the DLL and, on Windows, to the debugger
// via OutputDebugStringA so they can be followed live with DebugView while
// the game runs.

use crate::config::LogConfig;
use crate::error::{Error, Result};
use simplelog::{CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, WriteLogger};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Prefix on every line sent to the debugger.
pub const DEBUG_PREFIX: &str = "[jabia_trainer]";

/// One debugger line: prefix, level, message.
pub fn debug_line(level: log::Level, args: &std::fmt::Arguments<'_>) -> String {
    // OutputDebugStringA stops at the first NUL.
    format!("{} {:<5} {}", DEBUG_PREFIX, level, args).replace('\0', " ")
}

/// The loggers for `path`. The debugger logger is always present on Windows;
/// the file logger only when the file could be created, otherwise the
/// error comes back alongside.
fn build_loggers(path: &Path, level: LevelFilter) -> (Vec<Box<dyn SharedLogger>>, Option<Error>) {
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    let file_error = match File::create(path) {
        Ok(file) => {
            loggers.push(WriteLogger::new(level, config, file));
            None
        }
        Err(e) => Some(Error::Io(e)),
    };
    #[cfg(windows)]
    loggers.push(Box::new(debug_output::DebugOutputLogger::new(level)));
    (loggers, file_error)
}

/// Start logging into `dir`/`cfg.file`. Returns the log file path.
///
/// If the file cannot be created the remaining loggers are still installed
/// and the file error is returned. Only the first call installs anything;
/// later calls are no-ops apart from returning the path.
pub fn init(dir: &Path, cfg: &LogConfig) -> Result<PathBuf> {
    let path = dir.join(&cfg.file);
    let (loggers, file_error) = build_loggers(&path, cfg.level_filter());

    if !loggers.is_empty() {
        // Already initialized (the DLL was reloaded into the same process).
        let _ = CombinedLogger::init(loggers);
    }
    match file_error {
        Some(e) => Err(e),
        None => Ok(path),
    }
}

#[cfg(windows)]
mod debug_output {
    use super::debug_line;
    use log::{LevelFilter, Log, Metadata, Record};
    use simplelog::{Config, SharedLogger};
    use std::ffi::CString;
    use winapi::um::debugapi::OutputDebugStringA;

    pub struct DebugOutputLogger {
        level: LevelFilter,
    }

    impl DebugOutputLogger {
        pub fn new(level: LevelFilter) -> Self {
            Self { level }
        }
    }

    impl Log for DebugOutputLogger {
        fn enabled(&self, metadata: &Metadata<'_>) -> bool {
            metadata.level() <= self.level
        }

        fn log(&self, record: &Record<'_>) {
            if !self.enabled(record.metadata()) {
                return;
            }
            if let Ok(line) = CString::new(debug_line(record.level(), record.args())) {
                unsafe { OutputDebugStringA(line.as_ptr()) };
            }
        }

        fn flush(&self) {}
    }

    impl SharedLogger for DebugOutputLogger {
        fn level(&self) -> LevelFilter {
            self.level
        }

        fn config(&self) -> Option<&Config> {
            None
        }

        fn as_log(self: Box<Self>) -> Box<dyn Log> {
            Box::new(*self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_line_format() {
        let line = debug_line(log::Level::Info, &format_args!("hook at {:08X}", 0x532B58));
        assert_eq!(line, "[jabia_trainer] INFO  hook at 00532B58");
        let line = debug_line(log::Level::Warn, &format_args!("a\0b"));
        assert!(!line.contains('\0'));
    }

    #[test]
    fn test_init_writes_into_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = LogConfig { level: "info".to_string(), file: "t.log".to_string() };
        let path = init(dir.path(), &cfg).unwrap();
        assert_eq!(path, dir.path().join("t.log"));
        log::info!("logger smoke line");
        log::logger().flush();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("logger smoke line"));
        // A second init must not fail.
        assert!(init(dir.path(), &LogConfig { file: "u.log".to_string(), ..cfg.clone() }).is_ok());

        // An unwritable location reports the file but keeps logging alive.
        let missing = dir.path().join("no_such_dir");
        let err = init(&missing, &cfg).unwrap_err();
        assert!(err.is_not_found());
        log::info!("after missing dir");
        log::logger().flush();
        assert!(std::fs::read_to_string(&path).unwrap().contains("after missing dir"));
    }

    #[test]
    fn test_missing_dir_keeps_debugger_logger() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_such_dir").join("t.log");
        let (loggers, err) = build_loggers(&path, LevelFilter::Info);
        assert!(err.is_some());
        assert_eq!(loggers.len(), usize::from(cfg!(windows)));

        let (loggers, err) = build_loggers(&dir.path().join("t.log"), LevelFilter::Info);
        assert!(err.is_none());
        assert_eq!(loggers.len(), 1 + usize::from(cfg!(windows)));
    }
}
