use crate::shared::time::now_rfc3339;
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// JSON-lines engine log. Writes are best-effort and never surface errors to
/// planning or execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineLog {
    path: Option<PathBuf>,
}

impl EngineLog {
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn append(&self, level: LogLevel, event: &str, message: &str, fields: Map<String, Value>) {
        let Some(path) = self.path.as_ref() else {
            return;
        };
        let mut payload = Map::from_iter([
            ("timestamp".to_string(), Value::String(now_rfc3339())),
            ("level".to_string(), Value::String(level.as_str().to_string())),
            ("event".to_string(), Value::String(event.to_string())),
            ("message".to_string(), Value::String(message.to_string())),
        ]);
        for (key, value) in fields {
            payload.entry(key).or_insert(value);
        }
        let Ok(line) = serde_json::to_string(&Value::Object(payload)) else {
            return;
        };
        let _ = append_log_line(path, &line);
    }

    pub fn info(&self, event: &str, message: &str, fields: Map<String, Value>) {
        self.append(LogLevel::Info, event, message, fields);
    }

    pub fn warn(&self, event: &str, message: &str, fields: Map<String, Value>) {
        self.append(LogLevel::Warn, event, message, fields);
    }

    pub fn error(&self, event: &str, message: &str, fields: Map<String, Value>) {
        self.append(LogLevel::Error, event, message, fields);
    }
}

fn append_log_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{line}")
}

pub fn log_fields<const N: usize>(fields: [(&str, Value); N]) -> Map<String, Value> {
    Map::from_iter(
        fields
            .into_iter()
            .map(|(key, value)| (key.to_string(), value)),
    )
}
