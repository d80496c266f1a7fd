pub mod bencode;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod metainfo;
pub mod scanner;
pub mod testing;
pub mod torrent_client;
pub mod tracker;
pub mod tracker_api;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, InjectionConfig,
    SanitizedConfig, TorrentClientBackend,
};
pub use dedup::DedupIndex;
pub use engine::{GenerateError, Generated, Regenerator};
pub use metainfo::{InfoHash, MetainfoError, SourceFlag, TorrentMetadata};
pub use scanner::{
    scan_directory, scan_file, scan_info_hash, DuplicatePolicy, Injector, ScanEntry, ScanError,
    ScanOutcome, ScanReport,
};
pub use torrent_client::{create_torrent_client, TorrentClient, TorrentClientError};
pub use tracker::Tracker;
pub use tracker_api::{GazelleClient, LookupResult, TrackerLookup, TrackerLookups};
