//! Destination resolution: template rendering plus the collision policy.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use soundforged_core::{Result, SourceFile};

use crate::field::Field;
use crate::sanitize::{clean_tag_value, sanitize_relative_path};
use crate::template::Template;

/// Where rendered paths are rooted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputRoot {
    /// Next to the source, under the folder it was selected from.
    SameAsSource,
    /// Under a fixed output folder.
    Folder(PathBuf),
}

/// Settings that shape the rendered path besides the template itself.
#[derive(Debug, Clone)]
pub struct NamingOptions {
    pub output: OutputRoot,
    /// Text used for missing tags, rendered as e.g. `Unknown Artist`.
    pub unknown_token: String,
    /// Reduce the path to plain ASCII.
    pub replace_messy_chars: bool,
    /// Value of `{target_extension}`, without the dot.
    pub target_extension: String,
    /// Treat paths that already exist on disk as claimed.
    pub avoid_existing_files: bool,
}

impl Default for NamingOptions {
    fn default() -> Self {
        Self {
            output: OutputRoot::SameAsSource,
            unknown_token: "Unknown".to_string(),
            replace_messy_chars: false,
            target_extension: "mp3".to_string(),
            avoid_existing_files: false,
        }
    }
}

/// A set of destination paths that are already taken.
pub trait ClaimedPaths {
    fn is_claimed(&self, path: &Path) -> bool;
}

impl ClaimedPaths for HashSet<PathBuf> {
    fn is_claimed(&self, path: &Path) -> bool {
        self.contains(path)
    }
}

impl ClaimedPaths for BTreeSet<PathBuf> {
    fn is_claimed(&self, path: &Path) -> bool {
        self.contains(path)
    }
}

impl<V> ClaimedPaths for HashMap<PathBuf, V> {
    fn is_claimed(&self, path: &Path) -> bool {
        self.contains_key(path)
    }
}

impl<V> ClaimedPaths for BTreeMap<PathBuf, V> {
    fn is_claimed(&self, path: &Path) -> bool {
        self.contains_key(path)
    }
}

impl ClaimedPaths for [PathBuf] {
    fn is_claimed(&self, path: &Path) -> bool {
        self.iter().any(|p| p == path)
    }
}

/// Renders destinations for source files.
///
/// Resolution is a pure function of the source, the template, the options
/// and the claimed set (plus the filesystem when `avoid_existing_files` is
/// on). It never records the result; callers that need claims to stick use
/// [`DestinationClaims`](crate::DestinationClaims).
#[derive(Debug, Clone)]
pub struct Resolver {
    template: Template,
    options: NamingOptions,
}

impl Resolver {
    pub fn new(template: Template, options: NamingOptions) -> Self {
        Self { template, options }
    }

    /// Parse `pattern` and build a resolver from it.
    pub fn parse(pattern: &str, options: NamingOptions) -> Result<Self> {
        Ok(Self::new(Template::parse(pattern)?, options))
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn options(&self) -> &NamingOptions {
        &self.options
    }

    /// The destination before the collision policy is applied.
    pub fn base_destination(&self, source: &SourceFile) -> PathBuf {
        let rendered = self.template.render(|field| self.field_value(field, source));
        let relative = sanitize_relative_path(&rendered, self.options.replace_messy_chars);

        let root = match &self.options.output {
            OutputRoot::SameAsSource => source.base_dir.clone(),
            OutputRoot::Folder(dir) => dir.clone(),
        };
        if self.template.creates_subfolders() {
            root.join(relative)
        } else {
            root.join(&source.subfolder).join(relative)
        }
    }

    /// Resolve a free destination for `source`: the base destination, or the
    /// first of `_2`, `_3`, ... that is not claimed.
    pub fn resolve<C>(&self, source: &SourceFile, claimed: &C) -> PathBuf
    where
        C: ClaimedPaths + ?Sized,
    {
        let base = self.base_destination(source);
        if !self.is_taken(&base, claimed) {
            return base;
        }
        let mut n = 2u32;
        loop {
            let candidate = with_collision_suffix(&base, n);
            if !self.is_taken(&candidate, claimed) {
                tracing::debug!(
                    source = %source.path.display(),
                    destination = %candidate.display(),
                    "destination renamed to avoid collision"
                );
                return candidate;
            }
            n += 1;
        }
    }

    fn is_taken<C>(&self, path: &Path, claimed: &C) -> bool
    where
        C: ClaimedPaths + ?Sized,
    {
        claimed.is_claimed(path) || (self.options.avoid_existing_files && path.exists())
    }

    fn field_value(&self, field: Field, source: &SourceFile) -> String {
        let tags = &source.tags;
        let text = |value: &Option<String>| value.as_deref().and_then(clean_tag_value);
        let unknown = || format!("{} {}", self.options.unknown_token, field.fallback_label());
        let number = |value: Option<u32>| value.unwrap_or(0).to_string();

        match field {
            Field::Artist => text(&tags.artist).unwrap_or_else(unknown),
            Field::AlbumArtist => text(&tags.album_artist)
                .or_else(|| text(&tags.artist))
                .unwrap_or_else(unknown),
            Field::Album => text(&tags.album).unwrap_or_else(unknown),
            Field::Genre => text(&tags.genre).unwrap_or_else(unknown),
            Field::Year => text(&tags.year).unwrap_or_else(unknown),
            Field::Title => text(&tags.title)
                .or_else(|| clean_tag_value(&source.original_basename()))
                .unwrap_or_else(|| format!("{} Title", self.options.unknown_token)),
            Field::TrackNumber => number(tags.track_number),
            Field::TrackCount => number(tags.track_count),
            Field::DiscNumber => number(tags.disc_number),
            Field::DiscCount => number(tags.disc_count),
            Field::FileExtension => source.file_extension(),
            Field::OriginalBasename => source.original_basename(),
            Field::TargetExtension => self.options.target_extension.clone(),
        }
    }
}

/// Insert `_n` before the extension of the final component, or append it
/// when there is no extension.
pub fn with_collision_suffix(path: &Path, n: u32) -> PathBuf {
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let renamed = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{n}.{ext}"),
        _ => format!("{name}_{n}"),
    };
    path.with_file_name(renamed)
}
