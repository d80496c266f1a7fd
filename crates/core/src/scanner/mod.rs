//! Single-file and directory scans: dedup index construction, the
//! regeneration engine, optional injection, and the outcome report.

mod injector;
mod report;

pub use injector::{DuplicatePolicy, Injector};
pub use report::{describe, ScanEntry, ScanOutcome, ScanReport};

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::dedup::{torrent_files, DedupIndex};
use crate::engine::{GenerateError, Generated, Regenerator};
use crate::metainfo::InfoHash;
use crate::torrent_client::TorrentClientError;
use crate::tracker_api::TrackerLookups;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("input file does not exist: {0}")]
    MissingInput(PathBuf),

    #[error("input directory does not exist: {0}")]
    MissingInputDirectory(PathBuf),

    #[error("no torrent with infohash {0} in the input directory")]
    UnknownInfoHash(InfoHash),

    #[error("failed to read or create {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error("injection failed: {0}")]
    Injection(#[from] TorrentClientError),
}

/// Regenerates one torrent. Only the output directory is checked for
/// duplicates.
pub async fn scan_file(
    path: &Path,
    output_dir: &Path,
    lookups: &TrackerLookups,
    injector: Option<&Injector>,
) -> Result<Generated, ScanError> {
    if !is_file(path).await {
        return Err(ScanError::MissingInput(path.to_path_buf()));
    }
    create_dir(output_dir).await?;

    let input_index = DedupIndex::empty();
    let output_index = index(output_dir).await?;
    let regenerator = Regenerator::new(output_dir, lookups, &input_index, &output_index);

    process(&regenerator, path, injector).await
}

/// Regenerates every torrent below `input_dir`, one at a time in path
/// order. Per-file failures are recorded in the report, not returned.
pub async fn scan_directory(
    input_dir: &Path,
    output_dir: &Path,
    lookups: &TrackerLookups,
    injector: Option<&Injector>,
) -> Result<ScanReport, ScanError> {
    if !is_dir(input_dir).await {
        return Err(ScanError::MissingInputDirectory(input_dir.to_path_buf()));
    }
    create_dir(output_dir).await?;

    let input_index = index(input_dir).await?;
    let output_index = index(output_dir).await?;
    let files = torrent_files(input_dir).await.map_err(|source| ScanError::Io {
        path: input_dir.to_path_buf(),
        source,
    })?;
    let regenerator = Regenerator::new(output_dir, lookups, &input_index, &output_index);

    info!(dir = %input_dir.display(), count = files.len(), "Scanning torrents");
    let mut report = ScanReport::start(input_dir);

    for (i, path) in files.into_iter().enumerate() {
        let result = process(&regenerator, &path, injector).await;
        let entry = ScanEntry::from_result(path, &result);

        match entry.outcome {
            ScanOutcome::Failed => warn!(
                n = i + 1,
                path = %entry.path.display(),
                error = %entry.message,
                "Failed to process torrent"
            ),
            outcome => info!(
                n = i + 1,
                path = %entry.path.display(),
                outcome = outcome.as_str(),
                "{}",
                entry.message
            ),
        }
        report.push(entry);
    }

    Ok(report.finish())
}

/// Regenerates the torrent in `input_dir` whose infohash is `info_hash`.
/// Both directories are checked for duplicates, as in a directory scan.
pub async fn scan_info_hash(
    info_hash: &InfoHash,
    input_dir: &Path,
    output_dir: &Path,
    lookups: &TrackerLookups,
    injector: Option<&Injector>,
) -> Result<Generated, ScanError> {
    if !is_dir(input_dir).await {
        return Err(ScanError::MissingInputDirectory(input_dir.to_path_buf()));
    }
    create_dir(output_dir).await?;

    let input_index = index(input_dir).await?;
    let path = input_index
        .get(info_hash)
        .map(Path::to_path_buf)
        .ok_or(ScanError::UnknownInfoHash(*info_hash))?;
    let output_index = index(output_dir).await?;
    let regenerator = Regenerator::new(output_dir, lookups, &input_index, &output_index);

    info!(info_hash = %info_hash, path = %path.display(), "Processing torrent by infohash");
    process(&regenerator, &path, injector).await
}

async fn process(
    regenerator: &Regenerator<'_>,
    path: &Path,
    injector: Option<&Injector>,
) -> Result<Generated, ScanError> {
    let generated = regenerator.generate(path).await?;

    if let Some(injector) = injector {
        if injector.should_inject(&generated) {
            let info_hash = injector.inject(path, &generated.path).await?;
            info!(
                client = injector.client_name(),
                info_hash = %info_hash,
                "Injected torrent"
            );
        }
    }

    Ok(generated)
}

async fn index(dir: &Path) -> Result<DedupIndex, ScanError> {
    DedupIndex::scan_dir(dir)
        .await
        .map_err(|source| ScanError::Io {
            path: dir.to_path_buf(),
            source,
        })
}

async fn create_dir(dir: &Path) -> Result<(), ScanError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| ScanError::Io {
            path: dir.to_path_buf(),
            source,
        })
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}
