//! Per-context log entries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Exception,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Exception => "exception",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(LogLevel::Info),
            "exception" => Ok(LogLevel::Exception),
            other => Err(WorkflowError::message(format!("unknown log level '{other}'"))),
        }
    }
}

/// One line of a context's append-only log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub context_name: String,
    pub level: LogLevel,
    pub message: String,
    pub time: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(context_name: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            context_name: context_name.into(),
            level,
            message: message.into(),
            time: Utc::now(),
        }
    }
}
