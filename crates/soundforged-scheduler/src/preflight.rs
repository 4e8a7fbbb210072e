//! Destination checks run when a job is admitted, before the adapter sees it.

use std::path::Path;

use soundforged_core::{Error, Result};

/// Fail fast when `destination` cannot be written: it already exists, its
/// nearest existing folder is not a writable directory, or the filesystem has
/// less than `min_free_bytes` available.
pub fn check_destination(destination: &Path, min_free_bytes: u64) -> Result<()> {
    if destination.exists() {
        return Err(Error::unwritable(destination, "file already exists"));
    }

    let folder = nearest_existing_ancestor(destination)
        .ok_or_else(|| Error::unwritable(destination, "no existing parent folder"))?;
    if !folder.is_dir() {
        return Err(Error::unwritable(
            destination,
            format!("{} is not a directory", folder.display()),
        ));
    }

    check_writable(destination, folder)?;

    if min_free_bytes > 0 {
        if let Some(free) = available_bytes(folder) {
            if free < min_free_bytes {
                return Err(Error::unwritable(
                    destination,
                    format!("disk full: {free} bytes free, {min_free_bytes} required"),
                ));
            }
        }
    }
    Ok(())
}

fn nearest_existing_ancestor(path: &Path) -> Option<&Path> {
    // An empty ancestor is the current directory of a relative path.
    path.ancestors()
        .skip(1)
        .map(|p| if p.as_os_str().is_empty() { Path::new(".") } else { p })
        .find(|p| p.exists())
}

#[cfg(unix)]
fn check_writable(destination: &Path, folder: &Path) -> Result<()> {
    use nix::unistd::{access, AccessFlags};

    access(folder, AccessFlags::W_OK | AccessFlags::X_OK).map_err(|errno| {
        Error::unwritable(
            destination,
            format!("{} is not writable: {}", folder.display(), errno.desc()),
        )
    })
}

#[cfg(not(unix))]
fn check_writable(destination: &Path, folder: &Path) -> Result<()> {
    let meta = std::fs::metadata(folder)?;
    if meta.permissions().readonly() {
        return Err(Error::unwritable(
            destination,
            format!("{} is read-only", folder.display()),
        ));
    }
    Ok(())
}

#[cfg(unix)]
fn available_bytes(folder: &Path) -> Option<u64> {
    let stats = nix::sys::statvfs::statvfs(folder).ok()?;
    Some((stats.blocks_available() as u64).saturating_mul(stats.fragment_size() as u64))
}

#[cfg(not(unix))]
fn available_bytes(_folder: &Path) -> Option<u64> {
    None
}
