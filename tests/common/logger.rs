//! Structured per-test logging.
#![allow(dead_code)]
//!
//! ```rust,ignore
//! let log = TestLogger::new("dispatch_falls_back");
//! log.phase("setup");
//! log.http_mock("alpha", 200);
//! log.phase("dispatch");
//! log.finish_ok();
//! ```
//!
//! Environment:
//! - `TEST_LOG_LEVEL`: trace, debug, info (default), warn, error
//! - `TEST_LOG_JSON`: "1" or "true" for one JSON object per line
//! - `TEST_LOG_FILE`: also append entries to this file

use std::env;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::log_capture::TestLogCapture;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    const fn tag(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

#[derive(Debug, Serialize)]
struct LogEntry<'a> {
    timestamp: DateTime<Utc>,
    level: LogLevel,
    test: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    phase: Option<String>,
    elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<serde_json::Value>,
}

struct Settings {
    min_level: LogLevel,
    json: bool,
    file: Option<Mutex<File>>,
}

fn settings() -> &'static Settings {
    static SETTINGS: OnceLock<Settings> = OnceLock::new();
    SETTINGS.get_or_init(|| Settings {
        min_level: env::var("TEST_LOG_LEVEL")
            .ok()
            .and_then(|s| LogLevel::parse(&s))
            .unwrap_or(LogLevel::Info),
        json: env::var("TEST_LOG_JSON").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true")),
        file: env::var("TEST_LOG_FILE").ok().and_then(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
                .map(Mutex::new)
        }),
    })
}

/// Logger scoped to one test, tracking phase and elapsed time.
pub struct TestLogger {
    name: String,
    start: Instant,
    phase: Mutex<Option<String>>,
}

impl TestLogger {
    pub fn new(test_name: &str) -> Self {
        let logger = Self {
            name: test_name.to_string(),
            start: Instant::now(),
            phase: Mutex::new(None),
        };
        logger.debug("start");
        logger
    }

    /// Logger plus a capture of the code under test's `tracing` output.
    pub fn with_capture(test_name: &str) -> (Self, TestLogCapture) {
        (Self::new(test_name), TestLogCapture::start())
    }

    pub fn phase(&self, phase: &str) {
        *self.phase.lock().unwrap() = Some(phase.to_string());
        self.debug(&format!("phase: {phase}"));
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message, None);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message, None);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message, None);
    }

    pub fn with_context(&self, level: LogLevel, message: &str, context: serde_json::Value) {
        self.log(level, message, Some(context));
    }

    /// Record what a mock provider was set up to return.
    pub fn http_mock(&self, provider: &str, status: u16) {
        self.with_context(
            LogLevel::Debug,
            "mock provider",
            serde_json::json!({ "provider": provider, "status": status }),
        );
    }

    pub fn finish_ok(&self) {
        self.info(&format!("PASS in {} ms", self.elapsed_ms()));
    }

    pub fn finish_err(&self, reason: &str) {
        self.log(
            LogLevel::Error,
            &format!("FAIL in {} ms: {reason}", self.elapsed_ms()),
            None,
        );
    }

    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn log(&self, level: LogLevel, message: &str, context: Option<serde_json::Value>) {
        let settings = settings();
        if level < settings.min_level {
            return;
        }
        let phase = self.phase.lock().unwrap().clone();
        let line = if settings.json {
            serde_json::to_string(&LogEntry {
                timestamp: Utc::now(),
                level,
                test: &self.name,
                message,
                phase,
                elapsed_ms: self.elapsed_ms(),
                context,
            })
            .unwrap_or_default()
        } else {
            let phase = phase.map(|p| format!("[{p}] ")).unwrap_or_default();
            let context = context.map(|c| format!(" {c}")).unwrap_or_default();
            format!(
                "{:>5} {} {phase}{message}{context} (+{}ms)",
                level.tag(),
                self.name,
                self.elapsed_ms()
            )
        };

        eprintln!("{line}");
        if let Some(file) = &settings.file {
            let _ = writeln!(file.lock().unwrap(), "{line}");
        }
    }
}
