//! Turning command-line inputs into source files.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use soundforged_core::SourceFile;
use walkdir::{DirEntry, WalkDir};

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

/// Expand files and folders into source files, in the order given.
///
/// Folders need `recursive`. A folder's own name is kept as the first
/// sub-folder of everything found under it, the way `cp -r` would copy it.
/// Hidden files and folders are skipped, and a file named twice is kept once.
pub fn collect_sources(inputs: &[PathBuf], recursive: bool) -> Result<Vec<SourceFile>> {
    let mut seen = HashSet::new();
    let mut sources = Vec::new();

    for input in inputs {
        if !input.exists() {
            anyhow::bail!("Input does not exist: {:?}", input);
        }

        if input.is_file() {
            if seen.insert(input.clone()) {
                sources.push(SourceFile::new(input.clone()));
            }
            continue;
        }

        if !recursive {
            anyhow::bail!("{:?} is a folder; pass --recursive to convert its contents", input);
        }

        let folder = std::fs::canonicalize(input)
            .with_context(|| format!("Failed to resolve folder: {:?}", input))?;
        let root = folder.parent().unwrap_or(&folder).to_path_buf();
        let before = sources.len();

        for entry in WalkDir::new(&folder)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            if seen.insert(path.clone()) {
                sources.push(SourceFile::under_root(path, &root));
            }
        }

        tracing::debug!(
            "Found {} file(s) under {:?}",
            sources.len() - before,
            folder
        );
    }

    Ok(sources)
}

/// Display form of a source relative to where it was found.
pub fn display_source(source: &SourceFile) -> String {
    relative_display(&source.path, &source.base_dir)
}

pub fn relative_display(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}
