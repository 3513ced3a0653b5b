use crate::error::{HookError, Result};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Log levels.  The numeric values are the ones the host loader's `Log` export expects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(LogLevel::Error),
            2 => Some(LogLevel::Warn),
            3 => Some(LogLevel::Info),
            4 => Some(LogLevel::Debug),
            5 => Some(LogLevel::Trace),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = HookError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(HookError::ConfReadFailed(format!("unknown log level: {}", other))),
        }
    }
}

/// Signature of the loader's `Log(msg, len, level)` export.
pub type LogForwardFn = extern "C" fn(msg: *const u8, len: usize, level: u8);

lazy_static! {
    static ref LOG_FILE_NAME: std::sync::Mutex<String> = std::sync::Mutex::new(String::new());
    /// Tests that change the global log configuration hold this.
    pub static ref LOG_EXCL_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
}

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Debug as u8);
// 0 means no forwarder; messages go to the log file.
static LOG_FORWARDER: AtomicUsize = AtomicUsize::new(0);

pub fn set_log_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn log_level() -> LogLevel {
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed)).unwrap_or(LogLevel::Debug)
}

#[inline]
pub fn log_enabled(level: LogLevel) -> bool {
    level as u8 <= LOG_LEVEL.load(Ordering::Relaxed)
}

/// Route log messages to the loader instead of the log file.  `None` restores file logging.
pub fn set_log_forwarder(f: Option<LogForwardFn>) {
    LOG_FORWARDER.store(f.map(|f| f as usize).unwrap_or(0), Ordering::Release);
}

fn log_forwarder() -> Option<LogForwardFn> {
    match LOG_FORWARDER.load(Ordering::Acquire) {
        0 => None,
        // only ever stored from a LogForwardFn in set_log_forwarder
        addr => Some(unsafe { std::mem::transmute::<usize, LogForwardFn>(addr) }),
    }
}

pub fn set_log_file_path(path: &str, name: &str) -> Result<()> {
    let lock = LOG_FILE_NAME.lock();
    match lock {
        Err(e) => Err(HookError::WinApiError(format!("lock error: {}", e))),
        Ok(mut fname) => {
            let mut p = std::path::PathBuf::from(path);
            p.push(name);
            *fname = p.to_string_lossy().into_owned();
            Ok(())
        }
    }
}

/// Return the log file path or "" if there was an error.  This function will temporarily lock
/// a global mutex protecting access to the variable.
pub fn get_log_file_path() -> String {
    match LOG_FILE_NAME.lock() {
        Err(e) => {
            eprintln!("OverlayCore: can't read log file path due to lock error: {}", e);
            "".to_owned()
        }
        Ok(fname) => (*fname).to_owned(),
    }
}

/// Leveled sink.  Drops messages above the configured level, otherwise hands them to the
/// loader if a forwarder is installed, or appends them to the log file.
pub fn write_log(level: LogLevel, msg: &str) {
    if !log_enabled(level) {
        return;
    }
    match log_forwarder() {
        Some(forward) => forward(msg.as_ptr(), msg.len(), level as u8),
        None => write_log_file(&format!("[{}] {}", level.name(), msg)),
    }
}

pub fn write_log_file(msg: &str) {
    use std::env::temp_dir;
    use std::fs::OpenOptions;
    use std::io::Write;

    let lock = LOG_FILE_NAME.lock();
    match lock {
        Err(e) => {
            eprintln!("OverlayCore: can't write log file due to lock error: {}", e);
        }
        Ok(mut fname) => {
            if (*fname).is_empty() {
                let mut td = temp_dir();
                td.push("OverlayCore.log");
                match td.as_path().to_str() {
                    None => {
                        eprintln!("OverlayCore: error getting temp path");
                        return;
                    }
                    Some(p) => {
                        *fname = p.to_owned();
                    }
                }
            }

            let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            let tid = std::thread::current().id();

            let w = || -> std::io::Result<()> {
                let mut f = OpenOptions::new().create(true).append(true).open(&*fname)?;
                writeln!(f, "{} {:?}: {}\r", now, tid, msg)?;
                Ok(())
            };

            w().unwrap_or_else(|e| eprintln!("OverlayCore: log file write error: {}", e));
        }
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if $crate::util::log_enabled($crate::util::LogLevel::Error) {
            $crate::util::write_log($crate::util::LogLevel::Error, &format!($($arg)*))
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if $crate::util::log_enabled($crate::util::LogLevel::Warn) {
            $crate::util::write_log($crate::util::LogLevel::Warn, &format!($($arg)*))
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if $crate::util::log_enabled($crate::util::LogLevel::Info) {
            $crate::util::write_log($crate::util::LogLevel::Info, &format!($($arg)*))
        }
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if $crate::util::log_enabled($crate::util::LogLevel::Debug) {
            $crate::util::write_log($crate::util::LogLevel::Debug, &format!($($arg)*))
        }
    };
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        if $crate::util::log_enabled($crate::util::LogLevel::Trace) {
            $crate::util::write_log($crate::util::LogLevel::Trace, &format!($($arg)*))
        }
    };
}
