//! The two reciprocal trackers and their static capabilities.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::metainfo::{SourceFlag, TorrentMetadata};

/// A supported tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tracker {
    Red,
    Ops,
}

const RED_SEARCH_FLAGS: &[SourceFlag] = &[SourceFlag::new("RED"), SourceFlag::new("PTH")];
const RED_CREATION_FLAGS: &[SourceFlag] = &[
    SourceFlag::new("RED"),
    SourceFlag::new("PTH"),
    SourceFlag::BLANK,
];
const OPS_SEARCH_FLAGS: &[SourceFlag] = &[SourceFlag::new("OPS")];
const OPS_CREATION_FLAGS: &[SourceFlag] = &[
    SourceFlag::new("OPS"),
    SourceFlag::new("APL"),
    SourceFlag::BLANK,
];

impl Tracker {
    /// Detection order: the first tracker that matches wins.
    pub const ALL: [Tracker; 2] = [Tracker::Red, Tracker::Ops];

    /// Source flags that identify a torrent as originating here.
    pub fn search_flags(&self) -> &'static [SourceFlag] {
        match self {
            Tracker::Red => RED_SEARCH_FLAGS,
            Tracker::Ops => OPS_SEARCH_FLAGS,
        }
    }

    /// Source flags to try when recreating a torrent for this tracker,
    /// most specific first.
    pub fn creation_flags(&self) -> &'static [SourceFlag] {
        match self {
            Tracker::Red => RED_CREATION_FLAGS,
            Tracker::Ops => OPS_CREATION_FLAGS,
        }
    }

    /// Host fragment present in every announce URL of this tracker.
    pub fn announce_fingerprint(&self) -> &'static str {
        match self {
            Tracker::Red => "flacsfor.me",
            Tracker::Ops => "home.opsfet.ch",
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Tracker::Red => "RED",
            Tracker::Ops => "OPS",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Tracker::Red => "Redacted",
            Tracker::Ops => "Orpheus",
        }
    }

    pub fn default_site_url(&self) -> &'static str {
        match self {
            Tracker::Red => "https://redacted.sh",
            Tracker::Ops => "https://orpheus.network",
        }
    }

    pub fn reciprocal(&self) -> Tracker {
        match self {
            Tracker::Red => Tracker::Ops,
            Tracker::Ops => Tracker::Red,
        }
    }

    /// Personal announce URL for a passkey.
    pub fn announce_url(&self, passkey: &str) -> String {
        format!("https://{}/{}/announce", self.announce_fingerprint(), passkey)
    }

    fn matches(&self, meta: &TorrentMetadata) -> bool {
        let fingerprint = self.announce_fingerprint().as_bytes();

        let by_source = meta
            .source()
            .is_some_and(|source| self.search_flags().iter().any(|f| f.as_bytes() == source));
        let by_announce = meta.announce_urls().iter().any(|url| {
            url.windows(fingerprint.len())
                .any(|window| window == fingerprint)
        });

        by_source || by_announce
    }

    /// Identifies the tracker a torrent came from by its source flag or
    /// announce URLs.
    pub fn detect(meta: &TorrentMetadata) -> Option<Tracker> {
        Self::ALL.into_iter().find(|tracker| tracker.matches(meta))
    }

    /// Like [`Tracker::detect`], falling back to the fast-resume sidecar
    /// only when the torrent itself gives no match.
    pub fn detect_with_sidecar(
        meta: &TorrentMetadata,
        sidecar: Option<&TorrentMetadata>,
    ) -> Option<Tracker> {
        Self::detect(meta).or_else(|| sidecar.and_then(Self::detect))
    }
}

impl fmt::Display for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_reciprocal_is_involution() {
        for tracker in Tracker::ALL {
            assert_ne!(tracker.reciprocal(), tracker);
            assert_eq!(tracker.reciprocal().reciprocal(), tracker);
        }
    }

    #[test]
    fn test_creation_flags_end_with_blank() {
        for tracker in Tracker::ALL {
            let flags = tracker.creation_flags();
            assert_eq!(flags.first(), tracker.search_flags().first());
            assert!(flags.last().unwrap().is_blank());
        }
    }

    #[test]
    fn test_detect_by_source() {
        let meta = fixtures::torrent("Album", Some("PTH"), None);
        assert_eq!(Tracker::detect(&meta), Some(Tracker::Red));

        let meta = fixtures::torrent("Album", Some("OPS"), None);
        assert_eq!(Tracker::detect(&meta), Some(Tracker::Ops));
    }

    #[test]
    fn test_detect_by_announce() {
        let meta = fixtures::torrent(
            "Album",
            None,
            Some("https://home.opsfet.ch/abc/announce"),
        );
        assert_eq!(Tracker::detect(&meta), Some(Tracker::Ops));
    }

    #[test]
    fn test_detect_unknown() {
        let meta = fixtures::torrent("Album", Some("XYZ"), Some("https://example.org/announce"));
        assert_eq!(Tracker::detect(&meta), None);
    }

    #[test]
    fn test_detect_prefers_torrent_over_sidecar() {
        let meta = fixtures::torrent("Album", Some("RED"), None);
        let sidecar = fixtures::fastresume(&["https://home.opsfet.ch/abc/announce"]);

        assert_eq!(
            Tracker::detect_with_sidecar(&meta, Some(&sidecar)),
            Some(Tracker::Red)
        );
    }

    #[test]
    fn test_detect_falls_back_to_sidecar() {
        let meta = fixtures::torrent("Album", None, None);
        let sidecar = fixtures::fastresume(&["https://flacsfor.me/abc/announce"]);

        assert_eq!(Tracker::detect(&meta), None);
        assert_eq!(
            Tracker::detect_with_sidecar(&meta, Some(&sidecar)),
            Some(Tracker::Red)
        );
    }

    #[test]
    fn test_announce_url() {
        assert_eq!(
            Tracker::Red.announce_url("pk"),
            "https://flacsfor.me/pk/announce"
        );
    }

    #[test]
    fn test_serde_uses_short_name() {
        assert_eq!(serde_json::to_string(&Tracker::Ops).unwrap(), "\"OPS\"");
    }
}
