use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::InjectionConfig;
use crate::engine::Generated;
use crate::metainfo::InfoHash;
use crate::torrent_client::{read_torrent_file, InjectRequest, TorrentClient, TorrentClientError};

/// What to do with a torrent that was already in the output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Report it and leave the client alone.
    #[default]
    Skip,
    /// Hand it to the client like a freshly generated file.
    Inject,
}

impl DuplicatePolicy {
    pub fn from_inject_existing(inject_existing: bool) -> Self {
        if inject_existing {
            DuplicatePolicy::Inject
        } else {
            DuplicatePolicy::Skip
        }
    }
}

/// Hands generated torrents to a torrent client.
#[derive(Clone)]
pub struct Injector {
    client: Arc<dyn TorrentClient>,
    label: String,
    save_path_override: Option<String>,
    policy: DuplicatePolicy,
}

impl Injector {
    pub fn new(client: Arc<dyn TorrentClient>, label: impl Into<String>) -> Self {
        Self {
            client,
            label: label.into(),
            save_path_override: None,
            policy: DuplicatePolicy::default(),
        }
    }

    pub fn from_config(client: Arc<dyn TorrentClient>, config: &InjectionConfig) -> Self {
        Self::new(client, config.label.clone())
            .with_save_path_override(config.save_path_override.clone())
            .with_policy(DuplicatePolicy::from_inject_existing(config.inject_existing))
    }

    pub fn with_save_path_override(mut self, save_path: Option<String>) -> Self {
        self.save_path_override = save_path;
        self
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    /// Whether `generated` should be handed to the client.
    pub fn should_inject(&self, generated: &Generated) -> bool {
        !generated.already_existed || self.policy == DuplicatePolicy::Inject
    }

    /// Injects `generated_path`, seeding from the data of the torrent at
    /// `source_path`.
    pub async fn inject(
        &self,
        source_path: &Path,
        generated_path: &Path,
    ) -> Result<InfoHash, TorrentClientError> {
        let (_, source_info_hash) = read_torrent_file(source_path).await?;
        debug!(
            client = self.client.name(),
            source = %source_info_hash,
            path = %generated_path.display(),
            "Injecting torrent"
        );

        self.client
            .inject_torrent(&InjectRequest {
                source_info_hash,
                torrent_path: generated_path.to_path_buf(),
                label: self.label.clone(),
                save_path_override: self.save_path_override.clone(),
            })
            .await
    }
}

impl std::fmt::Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector")
            .field("client", &self.client.name())
            .field("label", &self.label)
            .field("save_path_override", &self.save_path_override)
            .field("policy", &self.policy)
            .finish()
    }
}
