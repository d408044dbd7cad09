//! Report log domain types

use serde::{Deserialize, Serialize};

/// Level of a user-facing report line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A report line, as mirrored to every sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportLine {
    pub level: LogLevel,
    pub message: String,
}
