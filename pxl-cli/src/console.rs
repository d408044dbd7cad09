//! Coloured console sink

use colored::*;
use pxl_core::domain::log::{LogLevel, ReportLine};
use pxl_runner::ReportSink;
use pxl_runner::report::render;

/// Writes report lines to stdout, coloured by level
///
/// Errors go to stdout as well so the summary reads in order.
pub struct ConsoleSink;

impl ReportSink for ConsoleSink {
    fn write(&mut self, line: &ReportLine) {
        let text = render(line);
        let text = match line.level {
            LogLevel::Info if line.message.starts_with("== ") => text.bold(),
            LogLevel::Info => text.normal(),
            LogLevel::Success => text.green(),
            LogLevel::Warning => text.yellow(),
            LogLevel::Error => text.red(),
        };
        println!("{}", text);
    }
}
