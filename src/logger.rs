use std::sync::atomic::{AtomicU8, Ordering};

/// Severity threshold for [`Logger`]; messages below it are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl LogLevel {
    /// Parse "debug" | "info" | "warn" | "error" (case-insensitive).
    pub fn parse(level: &str) -> Option<Self> {
        match level.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

static THRESHOLD: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Simple logger for arthemi-checkout
pub struct Logger;

impl Logger {
    pub fn set_level(level: LogLevel) {
        THRESHOLD.store(level as u8, Ordering::Relaxed);
    }

    pub fn level() -> LogLevel {
        LogLevel::from_u8(THRESHOLD.load(Ordering::Relaxed))
    }

    pub fn enabled(level: LogLevel) -> bool {
        level >= Self::level()
    }

    pub fn info(msg: &str) {
        if Self::enabled(LogLevel::Info) {
            println!("[INFO] {}", msg);
        }
    }

    pub fn debug(msg: &str) {
        if Self::enabled(LogLevel::Debug) {
            println!("[DEBUG] {}", msg);
        }
    }

    pub fn warn(msg: &str) {
        if Self::enabled(LogLevel::Warn) {
            eprintln!("[WARN] {}", msg);
        }
    }

    pub fn error(msg: &str) {
        eprintln!("[ERROR] {}", msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_levels() {
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse(" warning "), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("verbose"), None);
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Error > LogLevel::Warn);
        assert!(LogLevel::Info > LogLevel::Debug);
    }
}
