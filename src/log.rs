use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

const LOG_CAPACITY: usize = 2000;
pub const LOG_FILE_NAME: &str = "logs.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Default)]
struct LogState {
    entries: Vec<LogEntry>,
    file: Option<PathBuf>,
    echo: bool,
}

/// Append-only operator log. Clones share the same buffer, so a background
/// task can keep writing while the interactive side reads.
#[derive(Debug, Clone, Default)]
pub struct Logger {
    inner: Arc<Mutex<LogState>>,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirrors every line to `<dir>/logs.txt` from now on.
    pub fn set_log_dir(&self, dir: &Path) {
        if let Ok(mut state) = self.inner.lock() {
            state.file = Some(dir.join(LOG_FILE_NAME));
        }
    }

    pub fn set_echo(&self, echo: bool) {
        if let Ok(mut state) = self.inner.lock() {
            state.echo = echo;
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(LogLevel::Info, message.into());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.push(LogLevel::Warn, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(LogLevel::Error, message.into());
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.inner
            .lock()
            .map(|state| state.entries.clone())
            .unwrap_or_default()
    }

    pub fn text(&self) -> String {
        self.entries()
            .iter()
            .map(|entry| format!("[{}] {}", log_level_label(entry.level), entry.message))
            .collect::<Vec<String>>()
            .join("\n")
    }

    fn push(&self, level: LogLevel, message: String) {
        let Ok(mut state) = self.inner.lock() else {
            return;
        };

        if state.echo {
            eprintln!("[{}] {}", log_level_label(level), message);
        }
        if let Some(path) = state.file.clone() {
            let _ = append_log_file(&path, level, &message);
        }

        state.entries.push(LogEntry { level, message });
        if state.entries.len() > LOG_CAPACITY {
            let overflow = state.entries.len() - LOG_CAPACITY;
            state.entries.drain(0..overflow);
        }
    }
}

pub fn log_level_label(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => "INFO",
        LogLevel::Warn => "WARN",
        LogLevel::Error => "ERROR",
    }
}

fn append_log_file(path: &Path, level: LogLevel, message: &str) -> std::io::Result<()> {
    let label = log_level_label(level);
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "[{label}] {message}")
}
