use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Level {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Format {
    Text,
    Json,
}

impl Format {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct LogConfig {
    pub level: Level,
    pub format: Format,
    pub timestamps: bool,
}

static MAX_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);
static JSON_LINES: AtomicBool = AtomicBool::new(false);
static TIMESTAMPS: AtomicBool = AtomicBool::new(true);
static STDERR: AtomicBool = AtomicBool::new(true);

/// One line kept for the in-app console strip.
#[derive(Clone, Debug, PartialEq)]
pub struct ConsoleEntry {
    pub ts_ms: u64,
    pub level: Level,
    pub target: &'static str,
    pub msg: String,
}

static CONSOLE_ON: AtomicBool = AtomicBool::new(false);
static CONSOLE_CAPACITY: AtomicUsize = AtomicUsize::new(0);
static CONSOLE: OnceLock<Mutex<VecDeque<ConsoleEntry>>> = OnceLock::new();

pub fn init(config: LogConfig) {
    MAX_LEVEL.store(config.level as u8, Ordering::Relaxed);
    JSON_LINES.store(matches!(config.format, Format::Json), Ordering::Relaxed);
    TIMESTAMPS.store(config.timestamps, Ordering::Relaxed);
}

pub fn enabled(level: Level) -> bool {
    level as u8 <= MAX_LEVEL.load(Ordering::Relaxed)
}

/// Turns stderr output off while a full-screen UI owns the terminal.
pub fn set_stderr_enabled(enabled: bool) {
    STDERR.store(enabled, Ordering::Relaxed);
}

pub fn enable_console(capacity: usize) {
    if capacity == 0 {
        CONSOLE_ON.store(false, Ordering::Relaxed);
        return;
    }
    CONSOLE_CAPACITY.store(capacity, Ordering::Relaxed);
    let buf = CONSOLE.get_or_init(|| Mutex::new(VecDeque::with_capacity(capacity.min(1024))));
    if let Ok(mut guard) = buf.lock() {
        while guard.len() > capacity {
            let _ = guard.pop_front();
        }
    }
    CONSOLE_ON.store(true, Ordering::Relaxed);
}

pub fn clear_console() {
    if let Some(buf) = CONSOLE.get() {
        if let Ok(mut guard) = buf.lock() {
            guard.clear();
        }
    }
}

/// Newest `limit` console entries, oldest first.
pub fn console_snapshot(limit: usize) -> Vec<ConsoleEntry> {
    let Some(buf) = CONSOLE.get() else {
        return Vec::new();
    };
    let Ok(guard) = buf.lock() else {
        return Vec::new();
    };
    let skip = guard.len().saturating_sub(limit);
    guard.iter().skip(skip).cloned().collect()
}

pub fn log(level: Level, target: &'static str, args: fmt::Arguments<'_>) {
    if !enabled(level) {
        return;
    }

    let ts_ms = now_ms();
    let to_console = CONSOLE_ON.load(Ordering::Relaxed);
    let to_stderr = STDERR.load(Ordering::Relaxed);
    if !to_console && !to_stderr {
        return;
    }
    let msg = args.to_string();

    if to_stderr {
        let mut out = io::stderr().lock();
        if JSON_LINES.load(Ordering::Relaxed) {
            let line = json!({
                "ts_ms": ts_ms,
                "level": level.as_str(),
                "target": target,
                "msg": msg,
            });
            let _ = writeln!(out, "{line}");
        } else if TIMESTAMPS.load(Ordering::Relaxed) {
            let _ = writeln!(
                out,
                "{} {} {target}: {msg}",
                UtcTime::from_ms(ts_ms),
                level.as_str()
            );
        } else {
            let _ = writeln!(out, "{} {target}: {msg}", level.as_str());
        }
    }

    if to_console {
        push_console(ConsoleEntry {
            ts_ms,
            level,
            target,
            msg,
        });
    }
}

fn push_console(entry: ConsoleEntry) {
    let cap = CONSOLE_CAPACITY.load(Ordering::Relaxed);
    if cap == 0 {
        return;
    }
    let Some(buf) = CONSOLE.get() else {
        return;
    };
    let Ok(mut guard) = buf.lock() else {
        return;
    };
    guard.push_back(entry);
    while guard.len() > cap {
        let _ = guard.pop_front();
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

#[macro_export]
macro_rules! log_at {
    ($level:expr, $($arg:tt)*) => {{
        if $crate::enabled($level) {
            $crate::log($level, module_path!(), format_args!($($arg)*));
        }
    }};
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Error, $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Warn, $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Info, $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Debug, $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Trace, $($arg)*);
    }};
}

/// Wall-clock time in UTC, split into calendar fields.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UtcTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub millis: u32,
}

impl UtcTime {
    pub fn from_ms(ts_ms: u64) -> Self {
        let secs = ts_ms / 1000;
        let days = (secs / 86_400) as i64;
        let of_day = (secs % 86_400) as u32;
        let (year, month, day) = civil_from_days(days);
        Self {
            year,
            month,
            day,
            hour: of_day / 3600,
            minute: (of_day % 3600) / 60,
            second: of_day % 60,
            millis: (ts_ms % 1000) as u32,
        }
    }

    /// `HH:MM:SS`, used where the date is noise.
    pub fn clock(&self) -> String {
        format!("{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

impl fmt::Display for UtcTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
            self.year, self.month, self.day, self.hour, self.minute, self.second, self.millis
        )
    }
}

// Howard Hinnant's days-to-civil conversion (public domain).
fn civil_from_days(days: i64) -> (i32, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe as i32 + era as i32 * 400 + i32::from(month <= 2);
    (year, month, day)
}
