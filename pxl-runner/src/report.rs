//! User-facing report
//!
//! The `Reporter` fans every line out to its sinks, so a persisted report
//! holds exactly what the console showed. The summary is always written
//! last.

use pxl_core::PipelineError;
use pxl_core::domain::log::{LogLevel, ReportLine};
use pxl_core::domain::result::{BatchRun, PhaseStatus};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::warn;

/// Destination for report lines
pub trait ReportSink: Send {
    /// Writes one line
    fn write(&mut self, line: &ReportLine);
}

/// Plain-text rendering shared by every sink
pub fn render(line: &ReportLine) -> String {
    let marker = match line.level {
        LogLevel::Info => "",
        LogLevel::Success => "[ok] ",
        LogLevel::Warning => "[warn] ",
        LogLevel::Error => "[error] ",
    };
    format!("{}{}", marker, line.message)
}

/// Fans report lines out to every registered sink
#[derive(Default)]
pub struct Reporter {
    sinks: Vec<Box<dyn ReportSink>>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: impl ReportSink + 'static) -> Self {
        self.add_sink(sink);
        self
    }

    pub fn add_sink(&mut self, sink: impl ReportSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        let line = ReportLine {
            level,
            message: message.into(),
        };
        for sink in &mut self.sinks {
            sink.write(&line);
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Success, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Section header
    pub fn section(&mut self, title: impl AsRef<str>) {
        let title = title.as_ref();
        self.info(String::new());
        self.info(format!("== {} ==", title));
    }

    /// Final summary: one line per project in processing order
    pub fn summary(&mut self, batch: &BatchRun) {
        self.section("Summary");

        if batch.is_empty() {
            self.warning("Nothing to run: no project matched the selection");
            return;
        }

        let (passed, failed, skipped) = self.result_lines(batch);
        let totals = format!(
            "{} project(s): {} passed, {} failed, {} skipped",
            batch.results.len(),
            passed,
            failed,
            skipped
        );
        if failed > 0 {
            self.error(totals);
        } else {
            self.success(totals);
        }
    }

    /// Summary of a batch stopped by an invocation-fatal error
    ///
    /// Lists the projects finished before the error, then the error itself.
    pub fn abort_summary(&mut self, batch: &BatchRun, error: &PipelineError) {
        self.section("Summary");
        self.result_lines(batch);
        self.error(format!("Aborted: {}", error));
    }

    /// One line per result; returns the passed, failed and skipped counts
    fn result_lines(&mut self, batch: &BatchRun) -> (usize, usize, usize) {
        let mut passed = 0;
        let mut failed = 0;
        let mut skipped = 0;

        for result in &batch.results {
            let phase = result
                .phase
                .map(|p| format!(" ({})", p))
                .unwrap_or_default();

            match result.status {
                PhaseStatus::Success => {
                    passed += 1;
                    self.success(format!("{}{}", result.display_name, phase));
                }
                PhaseStatus::Failure => {
                    failed += 1;
                    self.error(format!(
                        "{}{}: {}",
                        result.display_name, phase, result.reason_code
                    ));
                }
                PhaseStatus::Skipped => {
                    skipped += 1;
                    self.warning(format!(
                        "{} skipped: {}",
                        result.display_name, result.reason_code
                    ));
                }
            }
        }

        (passed, failed, skipped)
    }
}

/// Append-only report file
pub struct FileSink {
    file: File,
}

impl FileSink {
    /// Opens (or creates) the report file for appending
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }
}

impl ReportSink for FileSink {
    fn write(&mut self, line: &ReportLine) {
        if let Err(e) = writeln!(self.file, "{}", render(line)) {
            warn!("Failed to write report line: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemorySink;
    use pxl_core::domain::phase::Phase;
    use pxl_core::domain::project::{PipelineProject, PipelineType};
    use pxl_core::domain::result::{PhaseResult, ReasonCode};

    fn project(name: &str) -> PipelineProject {
        PipelineProject::from_template(PipelineType::Processing, name)
    }

    #[test]
    fn test_summary_lists_projects_in_order() {
        let sink = MemorySink::new();
        let mut reporter = Reporter::new().with_sink(sink.clone());

        let mut batch = BatchRun::new();
        batch.push(PhaseResult::succeeded(&project("a"), Phase::Deploy));
        let err = PipelineError::phase(Phase::Init, "boom");
        batch.push(PhaseResult::failed(&project("b"), Phase::Init, &err));
        batch.push(PhaseResult::skipped(&project("c"), ReasonCode::OptedOut));

        reporter.info("running");
        reporter.summary(&batch);

        let lines = sink.rendered();
        let summary_at = lines.iter().position(|l| l == "== Summary ==").unwrap();
        assert!(lines[..summary_at].contains(&"running".to_string()));

        let tail = &lines[summary_at + 1..];
        assert_eq!(tail[0], "[ok] processing/a (deploy)");
        assert_eq!(tail[1], "[error] processing/b (init): init-failed");
        assert_eq!(tail[2], "[warn] processing/c skipped: opted-out");
        assert_eq!(tail[3], "[error] 3 project(s): 1 passed, 1 failed, 1 skipped");
    }

    #[test]
    fn test_abort_summary_ends_with_the_error() {
        let sink = MemorySink::new();
        let mut reporter = Reporter::new().with_sink(sink.clone());

        let mut batch = BatchRun::new();
        batch.push(PhaseResult::succeeded(&project("a"), Phase::Test));
        let err = PipelineError::Schema("parameter 'epochs' has no default value".into());
        reporter.abort_summary(&batch, &err);

        let lines = sink.rendered();
        let summary_at = lines.iter().position(|l| l == "== Summary ==").unwrap();
        assert_eq!(
            lines[summary_at + 1..],
            [
                "[ok] processing/a (test)".to_string(),
                "[error] Aborted: invalid parameter schema: parameter 'epochs' has no default value"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_batch_notice() {
        let sink = MemorySink::new();
        let mut reporter = Reporter::new().with_sink(sink.clone());
        reporter.summary(&BatchRun::new());

        let last = sink.lines().pop().unwrap();
        assert_eq!(last.level, LogLevel::Warning);
        assert!(last.message.starts_with("Nothing to run"));
    }

    #[test]
    fn test_file_sink_mirrors_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("reports/run.log");

        let memory = MemorySink::new();
        {
            let mut reporter = Reporter::new()
                .with_sink(memory.clone())
                .with_sink(FileSink::open(&path).unwrap());
            reporter.success("init done");
            reporter.error("test failed");
        }
        {
            let mut reporter = Reporter::new().with_sink(FileSink::open(&path).unwrap());
            reporter.info("second invocation");
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let file_lines: Vec<&str> = content.lines().collect();
        assert_eq!(file_lines[..2], memory.rendered()[..]);
        assert_eq!(file_lines[2], "second invocation");
    }
}
