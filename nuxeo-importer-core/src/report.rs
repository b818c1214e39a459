//! Run statistics and the end-of-run report.
//!
//! [`RunStats`] is owned by the scheduler's coordinator loop and only mutated
//! there; workers report outcomes over a channel instead of touching counters.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::pipeline::PipelineError;
use crate::walker::EntryKind;

/// One failed file or folder.
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub path: PathBuf,
    /// Pipeline step that failed (`create`, `upload`, `transition`, ...).
    pub stage: &'static str,
    pub error_message: String,
    pub error_detail: Option<String>,
    /// The remote document exists but was not fully processed.
    pub document_created: bool,
}

impl FailureRecord {
    pub fn from_pipeline(path: PathBuf, error: &PipelineError) -> Self {
        FailureRecord {
            path,
            stage: error.stage(),
            error_message: error.to_string(),
            error_detail: Some(format!("{error:#?}")),
            document_created: error.document_exists(),
        }
    }

    pub fn listing(path: PathBuf, error: &std::io::Error) -> Self {
        FailureRecord {
            path,
            stage: "list",
            error_message: format!("cannot list directory: {error}"),
            error_detail: Some(format!("{error:#?}")),
            document_created: false,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct RunStats {
    pub files_count: usize,
    pub folders_count: usize,
    pub files_created: usize,
    pub folders_created: usize,
    pub files_failed: Vec<FailureRecord>,
    pub folders_failed: Vec<FailureRecord>,
    /// Directories whose children could not be listed. The directory itself
    /// may have been created; its subtree is missing from the run.
    pub listing_failed: Vec<FailureRecord>,
    /// Discovered tasks that were never started (cancellation or abort).
    pub not_started: usize,
}

impl RunStats {
    pub fn record_started(&mut self, kind: EntryKind) {
        match kind {
            EntryKind::File => self.files_count += 1,
            EntryKind::Folder => self.folders_count += 1,
        }
    }

    pub fn record_created(&mut self, kind: EntryKind) {
        match kind {
            EntryKind::File => self.files_created += 1,
            EntryKind::Folder => self.folders_created += 1,
        }
    }

    pub fn record_failure(&mut self, kind: EntryKind, record: FailureRecord) {
        match kind {
            EntryKind::File => self.files_failed.push(record),
            EntryKind::Folder => self.folders_failed.push(record),
        }
    }

    pub fn documents_count(&self) -> usize {
        self.files_count + self.folders_count
    }

    pub fn documents_created(&self) -> usize {
        self.files_created + self.folders_created
    }

    pub fn record_listing_failure(&mut self, record: FailureRecord) {
        self.listing_failed.push(record);
    }

    pub fn failure_count(&self) -> usize {
        self.files_failed.len() + self.folders_failed.len() + self.listing_failed.len()
    }
}

/// Final state of one import run, built once the scheduler has drained.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub stats: RunStats,
    pub elapsed: Duration,
    /// A folder failed under the abort-run policy.
    pub aborted: bool,
    /// The shutdown signal fired before the run drained on its own.
    pub cancelled: bool,
}

impl RunReport {
    /// True when every discovered entry was imported completely.
    pub fn is_success(&self) -> bool {
        self.stats.failure_count() == 0 && self.stats.not_started == 0 && !self.aborted && !self.cancelled
    }

    /// Renders the textual summary. `verbose` adds the debug detail of every failure.
    pub fn render(&self, verbose: bool) -> String {
        let stats = &self.stats;
        let elapsed_ms = self.elapsed.as_millis();
        let average = match stats.documents_created() {
            0 => "n/a".to_string(),
            created => format!("{}ms", elapsed_ms / created as u128),
        };

        let mut out = String::new();
        let _ = writeln!(out);
        let _ = writeln!(out, "Report Summary");
        let _ = writeln!(out, "--------------");
        let _ = writeln!(
            out,
            "  Total documents processed   {}/{}",
            stats.documents_created(),
            stats.documents_count()
        );
        let _ = writeln!(
            out,
            "    Files processed           {}/{}",
            stats.files_created, stats.files_count
        );
        let _ = writeln!(
            out,
            "    Folders processed         {}/{}",
            stats.folders_created, stats.folders_count
        );
        if stats.not_started > 0 {
            let _ = writeln!(out, "  Not started                 {}", stats.not_started);
        }
        let _ = writeln!(out, "  Total time                  {elapsed_ms}ms");
        let _ = writeln!(out, "  Average time per document   {average}");
        if self.aborted {
            let _ = writeln!(out, "  Run aborted after a folder failure");
        } else if self.cancelled {
            let _ = writeln!(out, "  Run cancelled before completion");
        }
        let _ = writeln!(out);

        render_failures(&mut out, "Files not well processed", &stats.files_failed, verbose);
        render_failures(&mut out, "Folders not well processed", &stats.folders_failed, verbose);
        render_failures(&mut out, "Folders not listed", &stats.listing_failed, verbose);
        out
    }
}

fn render_failures(out: &mut String, title: &str, failures: &[FailureRecord], verbose: bool) {
    if failures.is_empty() {
        return;
    }
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", "-".repeat(title.len()));
    for failure in failures {
        let _ = writeln!(out, "{}", failure.path.display());
        let _ = writeln!(out, "  Reason: {}", failure.error_message);
        if failure.document_created {
            let _ = writeln!(out, "  Remote document exists but is incomplete ({} step)", failure.stage);
        }
        if verbose {
            if let Some(detail) = &failure.error_detail {
                let _ = writeln!(out, "  Error");
                for line in detail.lines() {
                    let _ = writeln!(out, "  {line}");
                }
            }
        }
        let _ = writeln!(out);
    }
}
