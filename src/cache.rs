//! Best-effort local snapshot cache.
//!
//! Lets a client paint the last known state immediately on launch while the
//! subscription comes up. Cache failures never propagate; the worst case is
//! starting from defaults.

use std::{fs, io, path::PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{dao::models::GameStateDoc, ident::GameId};

/// Entries older than this are ignored on load.
const STALE_AFTER_MS: i64 = 7 * 24 * 60 * 60 * 1000;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    cached_at_ms: i64,
    doc: GameStateDoc,
}

/// One JSON file per game under a cache directory.
pub struct SnapshotCache {
    dir: PathBuf,
}

impl SnapshotCache {
    /// Cache rooted at the given directory; created lazily on first store.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, game: &GameId) -> PathBuf {
        self.dir.join(format!("{game}.json"))
    }

    /// Persist a snapshot. Failures are logged and swallowed.
    pub fn store(&self, game: &GameId, doc: &GameStateDoc, now_ms: i64) {
        let entry = CacheEntry {
            cached_at_ms: now_ms,
            doc: doc.clone(),
        };
        if let Err(error) = self.try_store(game, &entry) {
            warn!(game = %game, %error, "failed to cache snapshot");
        }
    }

    fn try_store(&self, game: &GameId, entry: &CacheEntry) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let payload = serde_json::to_vec(entry)?;
        fs::write(self.path_for(game), payload)
    }

    /// Load the cached snapshot, if present, decodable, and fresh enough.
    pub fn load(&self, game: &GameId, now_ms: i64) -> Option<GameStateDoc> {
        let path = self.path_for(game);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return None,
            Err(error) => {
                warn!(game = %game, %error, "failed to read snapshot cache");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(error) => {
                warn!(game = %game, %error, "discarding corrupt snapshot cache");
                return None;
            }
        };

        let age_ms = now_ms.saturating_sub(entry.cached_at_ms);
        if age_ms > STALE_AFTER_MS {
            debug!(game = %game, age_ms, "ignoring stale snapshot cache");
            return None;
        }

        Some(entry.doc)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn game() -> GameId {
        GameId::sanitize("main").unwrap()
    }

    #[test]
    fn snapshot_round_trips() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path());

        let mut doc = GameStateDoc::default();
        doc.timer_seconds = 77;
        cache.store(&game(), &doc, 1_000);

        let loaded = cache.load(&game(), 2_000).unwrap();
        assert_eq!(loaded.timer_seconds, 77);
    }

    #[test]
    fn stale_entries_are_ignored() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path());

        cache.store(&game(), &GameStateDoc::default(), 0);
        assert!(cache.load(&game(), STALE_AFTER_MS + 1).is_none());
        assert!(cache.load(&game(), STALE_AFTER_MS).is_some());
    }

    #[test]
    fn corrupt_entries_are_discarded() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path());

        fs::create_dir_all(dir.path()).unwrap();
        fs::write(dir.path().join("main.json"), b"{not json").unwrap();
        assert!(cache.load(&game(), 0).is_none());
    }

    #[test]
    fn missing_entry_is_absent_not_an_error() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path());
        assert!(cache.load(&game(), 0).is_none());
    }

    #[test]
    fn games_get_separate_files() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path());

        let a = GameId::sanitize("rink-a").unwrap();
        let b = GameId::sanitize("rink-b").unwrap();
        let mut doc = GameStateDoc::default();
        doc.timer_seconds = 1;
        cache.store(&a, &doc, 0);

        assert!(cache.load(&a, 0).is_some());
        assert!(cache.load(&b, 0).is_none());
    }
}
