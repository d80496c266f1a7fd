//! Regeneration engine: derives a torrent for the reciprocal tracker.
//!
//! Each call is a sequence with terminal outcomes only. Either a complete
//! file is written, an existing one is reported, or nothing is written and
//! an error names why.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::dedup::DedupIndex;
use crate::metainfo::{fastresume_path, InfoHash, MetainfoError, SourceFlag, TorrentMetadata};
use crate::tracker::Tracker;
use crate::tracker_api::{torrent_permalink, LookupResult, TrackerLookup, TrackerLookups};

/// A regenerated (or previously regenerated) torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Generated {
    pub tracker: Tracker,
    pub path: PathBuf,
    /// True when the file was already in the output directory and nothing
    /// was written.
    pub already_existed: bool,
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: MetainfoError,
    },

    #[error("{path} is not from RED or OPS (checked source flag and announce URLs)")]
    UnknownTracker { path: PathBuf },

    #[error("torrent already exists in the input directory as {existing}")]
    AlreadyExists { existing: PathBuf },

    #[error("torrent could not be found on {tracker}")]
    TorrentNotFound { tracker: Tracker },

    #[error("{tracker} API error: {message}")]
    Lookup { tracker: Tracker, message: String },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: MetainfoError,
    },
}

/// Runs the search/creation algorithm against fixed collaborators.
pub struct Regenerator<'a> {
    output_dir: &'a Path,
    lookups: &'a TrackerLookups,
    input_index: &'a DedupIndex,
    output_index: &'a DedupIndex,
}

impl<'a> Regenerator<'a> {
    pub fn new(
        output_dir: &'a Path,
        lookups: &'a TrackerLookups,
        input_index: &'a DedupIndex,
        output_index: &'a DedupIndex,
    ) -> Self {
        Self {
            output_dir,
            lookups,
            input_index,
            output_index,
        }
    }

    pub async fn generate(&self, source_path: &Path) -> Result<Generated, GenerateError> {
        let source = TorrentMetadata::read(source_path)
            .await
            .map_err(|source| GenerateError::Decode {
                path: source_path.to_path_buf(),
                source,
            })?;

        let origin = self.origin_tracker(source_path, &source).await?;
        let target = origin.reciprocal();
        let lookup = self.lookups.for_tracker(target);
        debug!(
            path = %source_path.display(),
            origin = %origin,
            target = %target,
            "Resolved origin tracker"
        );

        let mut candidates = Vec::with_capacity(target.creation_flags().len());
        for &flag in target.creation_flags() {
            let candidate = source
                .with_source_flag(flag)
                .map_err(|source| GenerateError::Decode {
                    path: source_path.to_path_buf(),
                    source,
                })?;
            let hash = candidate.info_hash().map_err(|source| GenerateError::Decode {
                path: source_path.to_path_buf(),
                source,
            })?;
            candidates.push((flag, candidate, hash));
        }

        for (_, _, hash) in &candidates {
            if let Some(existing) = self.input_index.get(hash) {
                return Err(GenerateError::AlreadyExists {
                    existing: existing.to_path_buf(),
                });
            }
        }
        for (_, _, hash) in &candidates {
            if let Some(existing) = self.output_index.get(hash) {
                debug!(path = %existing.display(), "Found in output directory");
                return Ok(Generated {
                    tracker: target,
                    path: existing.to_path_buf(),
                    already_existed: true,
                });
            }
        }

        for (flag, candidate, hash) in candidates {
            debug!(tracker = %target, flag = %flag, info_hash = %hash, "Looking up torrent");

            match lookup.find(&hash).await {
                LookupResult::Found {
                    torrent_id,
                    file_path,
                } => {
                    debug!(tracker = %target, flag = %flag, torrent_id, "Found torrent");
                    let path = self.output_path(target, flag, &file_path, &hash);
                    return self.write_found(target, lookup, candidate, torrent_id, path).await;
                }
                LookupResult::NotFoundForHash { reason } => {
                    debug!(tracker = %target, flag = %flag, reason = %reason, "Not found for hash");
                }
                LookupResult::Other { message } => {
                    return Err(GenerateError::Lookup {
                        tracker: target,
                        message,
                    });
                }
            }
        }

        Err(GenerateError::TorrentNotFound { tracker: target })
    }

    async fn origin_tracker(
        &self,
        source_path: &Path,
        source: &TorrentMetadata,
    ) -> Result<Tracker, GenerateError> {
        if let Some(tracker) = Tracker::detect(source) {
            return Ok(tracker);
        }

        let sidecar_path = fastresume_path(source_path);
        let sidecar = match TorrentMetadata::read(&sidecar_path).await {
            Ok(sidecar) => Some(sidecar),
            Err(MetainfoError::Read { .. }) => None,
            Err(e) => {
                debug!(path = %sidecar_path.display(), error = %e, "Ignoring undecodable sidecar");
                None
            }
        };

        Tracker::detect_with_sidecar(source, sidecar.as_ref()).ok_or_else(|| {
            GenerateError::UnknownTracker {
                path: source_path.to_path_buf(),
            }
        })
    }

    async fn write_found(
        &self,
        target: Tracker,
        lookup: &dyn TrackerLookup,
        mut candidate: TorrentMetadata,
        torrent_id: u64,
        path: PathBuf,
    ) -> Result<Generated, GenerateError> {
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| GenerateError::Write {
                path: path.clone(),
                source: MetainfoError::Write {
                    path: path.clone(),
                    source: e,
                },
            })?;
        if exists {
            debug!(path = %path.display(), "Output file already exists");
            return Ok(Generated {
                tracker: target,
                path,
                already_existed: true,
            });
        }

        candidate.set_announce(lookup.announce_url());
        candidate.set_comment(&torrent_permalink(lookup.site_url(), torrent_id));
        // The origin's announce-list carries the origin passkey.
        candidate.clear_announce_list();

        candidate
            .write(&path)
            .await
            .map_err(|source| GenerateError::Write {
                path: path.clone(),
                source,
            })?;

        info!(
            tracker = %target,
            torrent_id,
            path = %path.display(),
            "Generated torrent"
        );

        Ok(Generated {
            tracker: target,
            path,
            already_existed: false,
        })
    }

    fn output_path(
        &self,
        target: Tracker,
        flag: SourceFlag,
        file_path: &str,
        hash: &InfoHash,
    ) -> PathBuf {
        let stem = sanitize_file_name(file_path).unwrap_or_else(|| hash.to_string());
        let file_name = if flag.is_blank() {
            format!("{}.torrent", stem)
        } else {
            format!("{} [{}].torrent", stem, flag.as_str().to_uppercase())
        };

        self.output_dir.join(target.short_name()).join(file_name)
    }
}

/// Makes a tracker-supplied name safe to use as a single path component.
fn sanitize_file_name(name: &str) -> Option<String> {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim();

    match cleaned {
        "" | "." | ".." => None,
        _ => Some(cleaned.to_string()),
    }
}
