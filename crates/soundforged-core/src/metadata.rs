//! Source files and the tags read from them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Tags read from a source file. Every field is optional; the naming layer
/// decides what a missing value renders as.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioTags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disc_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disc_count: Option<u32>,
}

impl AudioTags {
    /// True when no tag at all was found.
    pub fn is_empty(&self) -> bool {
        *self == AudioTags::default()
    }
}

/// Parse tag values such as `"3"`, `"03/12"` or `"1 of 2"` into
/// `(number, count)`.
pub fn parse_number_pair(raw: &str) -> (Option<u32>, Option<u32>) {
    let raw = raw.trim();
    let (first, second) = match raw.split_once('/') {
        Some((a, b)) => (a, Some(b)),
        None => match raw.split_once(" of ") {
            Some((a, b)) => (a, Some(b)),
            None => (raw, None),
        },
    };
    let number = first.trim().parse().ok();
    let count = second.and_then(|s| s.trim().parse().ok());
    (number, count)
}

/// One input file selected for conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Absolute or caller-relative path of the input.
    pub path: PathBuf,
    /// The selection root this file was found under. For a file picked
    /// directly this is its parent folder.
    pub base_dir: PathBuf,
    /// Folders between `base_dir` and the file. Empty for files picked directly.
    pub subfolder: PathBuf,
    #[serde(default)]
    pub tags: AudioTags,
    /// Audio duration in seconds, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

impl SourceFile {
    /// A file selected on its own.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self {
            path,
            base_dir,
            subfolder: PathBuf::new(),
            tags: AudioTags::default(),
            duration_secs: None,
            size_bytes: None,
        }
    }

    /// A file discovered while walking `root`. The folders between `root`
    /// and the file become [`SourceFile::subfolder`].
    pub fn under_root(path: impl Into<PathBuf>, root: &Path) -> Self {
        let mut source = Self::new(path);
        if let Some(parent) = source.path.parent() {
            if let Ok(rel) = parent.strip_prefix(root) {
                source.subfolder = rel.to_path_buf();
                source.base_dir = root.to_path_buf();
            }
        }
        source
    }

    pub fn with_tags(mut self, tags: AudioTags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_duration(mut self, secs: Option<f64>) -> Self {
        self.duration_secs = secs;
        self
    }

    /// File name without its final extension.
    pub fn original_basename(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Source extension without the dot, empty when there is none.
    pub fn file_extension(&self) -> String {
        self.path
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_pairs() {
        assert_eq!(parse_number_pair("3"), (Some(3), None));
        assert_eq!(parse_number_pair("03/12"), (Some(3), Some(12)));
        assert_eq!(parse_number_pair(" 1 of 2 "), (Some(1), Some(2)));
        assert_eq!(parse_number_pair("A1"), (None, None));
        assert_eq!(parse_number_pair("4/"), (Some(4), None));
    }

    #[test]
    fn basename_and_extension() {
        let src = SourceFile::new("/music/in/01 - Song.name.flac");
        assert_eq!(src.original_basename(), "01 - Song.name");
        assert_eq!(src.file_extension(), "flac");
        assert_eq!(src.base_dir, PathBuf::from("/music/in"));
        assert_eq!(src.subfolder, PathBuf::new());

        let bare = SourceFile::new("/music/in/README");
        assert_eq!(bare.file_extension(), "");
    }

    #[test]
    fn under_root_keeps_subfolders() {
        let src = SourceFile::under_root(
            "/music/library/Artist/Album/track.flac",
            Path::new("/music"),
        );
        assert_eq!(src.base_dir, PathBuf::from("/music"));
        assert_eq!(src.subfolder, PathBuf::from("library/Artist/Album"));
    }

    #[test]
    fn under_unrelated_root_falls_back_to_parent() {
        let src = SourceFile::under_root("/a/b/track.flac", Path::new("/elsewhere"));
        assert_eq!(src.base_dir, PathBuf::from("/a/b"));
        assert!(src.subfolder.as_os_str().is_empty());
    }

    #[test]
    fn empty_tags() {
        assert!(AudioTags::default().is_empty());
        let tags = AudioTags {
            artist: Some("X".into()),
            ..Default::default()
        };
        assert!(!tags.is_empty());
    }
}
