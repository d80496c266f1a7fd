use std::path::Path;

/// Suffix inserted before `.torrent` in the name handed to the client.
pub const INJECTED_FILE_SUFFIX: &str = "crosstag";

/// Picks the label for an injected torrent from the source torrent's label.
///
/// A label that already is, or ends in, the tool's label is kept as-is so
/// repeated runs never stack `.crosstag.crosstag`.
pub fn determine_label(existing: Option<&str>, tool_label: &str) -> String {
    match existing {
        None | Some("") => tool_label.to_string(),
        Some(label) if label == tool_label || label.ends_with(&format!(".{}", tool_label)) => {
            label.to_string()
        }
        Some(label) => format!("{}.{}", label, tool_label),
    }
}

/// `<stem>.crosstag.torrent` for the file at `path`.
pub fn injected_file_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}.{}.torrent", stem, INJECTED_FILE_SUFFIX)
}
