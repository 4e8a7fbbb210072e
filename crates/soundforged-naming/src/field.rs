//! Placeholder fields recognised in naming templates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A placeholder that may appear inside `{...}` in a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Artist,
    AlbumArtist,
    Album,
    Title,
    Genre,
    Year,
    TrackNumber,
    TrackCount,
    DiscNumber,
    DiscCount,
    /// Extension of the source file, without the dot.
    FileExtension,
    /// Source file name without its extension.
    OriginalBasename,
    /// Extension of the produced file, without the dot.
    TargetExtension,
}

impl Field {
    pub const ALL: [Field; 13] = [
        Field::Artist,
        Field::AlbumArtist,
        Field::Album,
        Field::Title,
        Field::Genre,
        Field::Year,
        Field::TrackNumber,
        Field::TrackCount,
        Field::DiscNumber,
        Field::DiscCount,
        Field::FileExtension,
        Field::OriginalBasename,
        Field::TargetExtension,
    ];

    /// Name as written inside a template.
    pub fn name(&self) -> &'static str {
        match self {
            Field::Artist => "artist",
            Field::AlbumArtist => "album_artist",
            Field::Album => "album",
            Field::Title => "title",
            Field::Genre => "genre",
            Field::Year => "year",
            Field::TrackNumber => "track_number",
            Field::TrackCount => "track_count",
            Field::DiscNumber => "disc_number",
            Field::DiscCount => "disc_count",
            Field::FileExtension => "file_extension",
            Field::OriginalBasename => "original_basename",
            Field::TargetExtension => "target_extension",
        }
    }

    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Numeric fields accept a zero-padding width and fall back to `0`.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Field::TrackNumber | Field::TrackCount | Field::DiscNumber | Field::DiscCount
        )
    }

    /// Word appended to the unknown token when a text tag is missing,
    /// e.g. `Unknown Artist`.
    pub(crate) fn fallback_label(&self) -> &'static str {
        match self {
            Field::Artist | Field::AlbumArtist => "Artist",
            Field::Album => "Album",
            Field::Genre => "Genre",
            Field::Year => "Year",
            _ => "",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for field in Field::ALL {
            assert_eq!(Field::from_name(field.name()), Some(field));
        }
        assert_eq!(Field::from_name("artst"), None);
        assert_eq!(Field::from_name("Artist"), None);
    }

    #[test]
    fn numeric_fields() {
        assert!(Field::TrackNumber.is_numeric());
        assert!(Field::DiscCount.is_numeric());
        assert!(!Field::Title.is_numeric());
        assert!(!Field::Year.is_numeric());
    }
}
