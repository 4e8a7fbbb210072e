//! A thread-safe claim set for resolving many sources concurrently.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use soundforged_core::SourceFile;

use crate::resolver::Resolver;

/// Destination paths handed out so far.
///
/// [`DestinationClaims::claim`] resolves and records under one lock, so two
/// sources whose templates render to the same name get different paths no
/// matter which thread gets there first.
#[derive(Debug, Default)]
pub struct DestinationClaims {
    claimed: Mutex<HashSet<PathBuf>>,
}

impl DestinationClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with paths that are already owned elsewhere (e.g. by queued jobs).
    pub fn with_existing(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            claimed: Mutex::new(paths.into_iter().collect()),
        }
    }

    /// Resolve a free destination for `source` and record it.
    pub fn claim(&self, resolver: &Resolver, source: &SourceFile) -> PathBuf {
        let mut claimed = self.claimed.lock();
        let destination = resolver.resolve(source, &*claimed);
        claimed.insert(destination.clone());
        destination
    }

    /// Give a path back, e.g. after the job owning it was dropped.
    pub fn release(&self, path: &Path) -> bool {
        self.claimed.lock().remove(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.claimed.lock().contains(path)
    }

    pub fn len(&self) -> usize {
        self.claimed.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{NamingOptions, OutputRoot};
    use std::sync::Arc;

    fn resolver() -> Resolver {
        Resolver::parse(
            "{original_basename}.mp3",
            NamingOptions {
                output: OutputRoot::Folder(PathBuf::from("/out")),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn sequential_claims_are_unique() {
        let claims = DestinationClaims::new();
        let r = resolver();
        let a = claims.claim(&r, &SourceFile::new("/x/a.flac"));
        let b = claims.claim(&r, &SourceFile::new("/y/a.flac"));
        assert_eq!(a, PathBuf::from("/out/a.mp3"));
        assert_eq!(b, PathBuf::from("/out/a_2.mp3"));
        assert_eq!(claims.len(), 2);
    }

    #[test]
    fn concurrent_claims_never_collide() {
        let claims = Arc::new(DestinationClaims::new());
        let r = Arc::new(resolver());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let claims = Arc::clone(&claims);
                let r = Arc::clone(&r);
                std::thread::spawn(move || {
                    (0..25)
                        .map(|j| claims.claim(&r, &SourceFile::new(format!("/in/{i}/{j}/same.flac"))))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for path in handle.join().unwrap() {
                assert!(all.insert(path.clone()), "duplicate destination {path:?}");
            }
        }
        assert_eq!(all.len(), 200);
        assert!(all.contains(Path::new("/out/same.mp3")));
        assert!(all.contains(Path::new("/out/same_200.mp3")));
    }

    #[test]
    fn release_frees_the_path() {
        let claims = DestinationClaims::with_existing([PathBuf::from("/out/a.mp3")]);
        let r = resolver();
        assert_eq!(claims.claim(&r, &SourceFile::new("/x/a.flac")), PathBuf::from("/out/a_2.mp3"));
        assert!(claims.release(Path::new("/out/a.mp3")));
        assert_eq!(claims.claim(&r, &SourceFile::new("/z/a.flac")), PathBuf::from("/out/a.mp3"));
    }
}
