use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::{GenerateError, Generated};
use crate::torrent_client::TorrentClientError;

use super::ScanError;

/// How processing one input file ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    Generated,
    AlreadyExists,
    NotFound,
    Skipped,
    Failed,
}

impl ScanOutcome {
    pub const ALL: [ScanOutcome; 5] = [
        ScanOutcome::Generated,
        ScanOutcome::AlreadyExists,
        ScanOutcome::NotFound,
        ScanOutcome::Skipped,
        ScanOutcome::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanOutcome::Generated => "generated",
            ScanOutcome::AlreadyExists => "already_exists",
            ScanOutcome::NotFound => "not_found",
            ScanOutcome::Skipped => "skipped",
            ScanOutcome::Failed => "failed",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ScanOutcome::Generated => "Generated",
            ScanOutcome::AlreadyExists => "Already exists",
            ScanOutcome::NotFound => "Not found",
            ScanOutcome::Skipped => "Skipped",
            ScanOutcome::Failed => "Errors",
        }
    }

    /// Classifies the result of processing one file.
    pub fn classify(result: &Result<Generated, ScanError>) -> Self {
        match result {
        Ok(generated) if generated.already_existed => ScanOutcome::AlreadyExists,
        Ok(_) => ScanOutcome::Generated,
        Err(ScanError::Generate(e)) => match e {
            GenerateError::AlreadyExists { .. } => ScanOutcome::AlreadyExists,
            GenerateError::TorrentNotFound { .. } => ScanOutcome::NotFound,
            GenerateError::UnknownTracker { .. } => ScanOutcome::Skipped,
            GenerateError::Decode { .. }
            | GenerateError::Lookup { .. }
            | GenerateError::Write { .. } => ScanOutcome::Failed,
        },
        Err(ScanError::UnknownInfoHash(_)) => ScanOutcome::NotFound,
        Err(ScanError::Injection(TorrentClientError::TorrentExistsInClient(_))) => {
            ScanOutcome::AlreadyExists
        }
        Err(_) => ScanOutcome::Failed,
    }
    }
}

/// One processed input file.
#[derive(Debug, Clone, Serialize)]
pub struct ScanEntry {
    pub path: PathBuf,
    pub outcome: ScanOutcome,
    pub message: String,
    /// The generated (or previously generated) torrent, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

impl ScanEntry {
    pub fn from_result(path: PathBuf, result: &Result<Generated, ScanError>) -> Self {
    let (message, output) = describe(result);

    Self {
        path,
        outcome: ScanOutcome::classify(result),
        message,
        output,
    }
    }
}

/// A human-readable message for `result`, plus the output torrent if any.
pub fn describe(result: &Result<Generated, ScanError>) -> (String, Option<PathBuf>) {
    match result {
        Ok(generated) if generated.already_existed => (
            format!(
                "Torrent already exists in output directory at {}",
                generated.path.display()
            ),
            Some(generated.path.clone()),
        ),
        Ok(generated) => (
            format!(
                "Found on {} and generated as {}",
                generated.tracker,
                generated.path.display()
            ),
            Some(generated.path.clone()),
        ),
        Err(e) => (e.to_string(), None),
    }
}

/// Summary of a directory scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub input_directory: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub entries: Vec<ScanEntry>,
}

impl ScanReport {
    pub fn start(input_directory: &Path) -> Self {
        Self {
            input_directory: input_directory.to_path_buf(),
            started_at: Utc::now(),
            finished_at: None,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: ScanEntry) {
        self.entries.push(entry);
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn count(&self, outcome: ScanOutcome) -> usize {
        self.entries.iter().filter(|e| e.outcome == outcome).count()
    }

    pub fn entries_with(&self, outcome: ScanOutcome) -> impl Iterator<Item = &ScanEntry> {
        self.entries.iter().filter(move |e| e.outcome == outcome)
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Scanned {} torrent(s) in {}",
            self.total(),
            self.input_directory.display()
        )?;
        if let Some(finished_at) = self.finished_at {
            let elapsed = finished_at - self.started_at;
            writeln!(f, "Finished in {:.1}s", elapsed.num_milliseconds() as f64 / 1000.0)?;
        }
        for outcome in ScanOutcome::ALL {
            writeln!(f, "  {:<15} {}", format!("{}:", outcome.label()), self.count(outcome))?;
        }
        Ok(())
    }
}
