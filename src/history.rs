//! Per-device history of visited games.
//!
//! A single JSON file holding the last-used game id plus a capped,
//! most-recent-first list of entries. Everything here is device-local
//! convenience state; losing the file only costs the shortcuts.

use std::{fs, io, path::PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ident::GameId;

/// Oldest non-favorites are evicted past this many entries.
pub const MAX_HISTORY_ENTRIES: usize = 50;

/// Whether this device minted the game id or picked it up from elsewhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreatedBy {
    /// Generated on this device.
    Me,
    /// Typed in, resolved from history, or shared by another device.
    #[default]
    Other,
}

/// One visited game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Sanitized game id.
    pub game_id: String,
    /// Operator-assigned display name, when one was set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    /// When this device first joined the game (epoch ms).
    pub created_ms: i64,
    /// When this device last joined the game (epoch ms).
    pub last_accessed_ms: i64,
    /// Pinned by the operator; survives eviction.
    #[serde(default)]
    pub favorite: bool,
    /// Recorded when the entry is created and never rewritten by later
    /// visits.
    #[serde(default)]
    pub created_by: CreatedBy,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_game_id: Option<String>,
    #[serde(default)]
    entries: Vec<HistoryEntry>,
}

/// The history file plus its location on disk.
pub struct GameHistory {
    path: PathBuf,
    file: HistoryFile,
}

impl GameHistory {
    /// Load from disk; a missing or corrupt file yields an empty history.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|error| {
                warn!(path = %path.display(), %error, "discarding corrupt history file");
                HistoryFile::default()
            }),
            Err(error) if error.kind() == io::ErrorKind::NotFound => HistoryFile::default(),
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to read history file");
                HistoryFile::default()
            }
        };
        Self { path, file }
    }

    /// Empty history that saves to the given path.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: HistoryFile::default(),
        }
    }

    /// Persist to disk. Failures are logged and swallowed.
    pub fn save(&self) {
        if let Err(error) = self.try_save() {
            warn!(path = %self.path.display(), %error, "failed to save history");
        }
    }

    fn try_save(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_vec_pretty(&self.file)?;
        fs::write(&self.path, payload)
    }

    /// The game this device used last, for startup resolution.
    pub fn last_game_id(&self) -> Option<&str> {
        self.file.last_game_id.as_deref()
    }

    /// Record a visit: the entry moves to the front, is created if new, and
    /// becomes the last-used game. `created_here` marks a freshly generated
    /// id and only matters on first contact; revisits keep the original
    /// creator. Evicts the oldest non-favorite past the cap (oldest favorite
    /// if everything is pinned).
    pub fn touch(&mut self, game: &GameId, created_here: bool, now_ms: i64) {
        self.file.last_game_id = Some(game.as_str().to_string());

        let entry = match self
            .file
            .entries
            .iter()
            .position(|e| e.game_id == game.as_str())
        {
            Some(idx) => {
                let mut entry = self.file.entries.remove(idx);
                entry.last_accessed_ms = now_ms;
                entry
            }
            None => HistoryEntry {
                game_id: game.as_str().to_string(),
                friendly_name: None,
                created_ms: now_ms,
                last_accessed_ms: now_ms,
                favorite: false,
                created_by: if created_here {
                    CreatedBy::Me
                } else {
                    CreatedBy::Other
                },
            },
        };
        self.file.entries.insert(0, entry);

        while self.file.entries.len() > MAX_HISTORY_ENTRIES {
            let victim = self
                .file
                .entries
                .iter()
                .rposition(|e| !e.favorite)
                .unwrap_or(self.file.entries.len() - 1);
            self.file.entries.remove(victim);
        }
    }

    /// Set or clear an entry's display name; unknown games are ignored.
    pub fn set_name(&mut self, game: &GameId, name: Option<String>) {
        if let Some(entry) = self.entry_mut(game) {
            entry.friendly_name = name.filter(|n| !n.trim().is_empty());
        }
    }

    /// Flip an entry's favorite flag, returning the new value (or `None` for
    /// an unknown game).
    pub fn toggle_favorite(&mut self, game: &GameId) -> Option<bool> {
        let entry = self.entry_mut(game)?;
        entry.favorite = !entry.favorite;
        Some(entry.favorite)
    }

    /// Drop an entry. The last-used pointer is cleared if it referred to it.
    pub fn remove(&mut self, game: &GameId) {
        self.file.entries.retain(|e| e.game_id != game.as_str());
        if self.file.last_game_id.as_deref() == Some(game.as_str()) {
            self.file.last_game_id = None;
        }
    }

    /// The most recently visited entries, newest first.
    pub fn recent(&self, limit: usize) -> &[HistoryEntry] {
        &self.file.entries[..self.file.entries.len().min(limit)]
    }

    /// Pinned entries, newest first.
    pub fn favorites(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.file.entries.iter().filter(|e| e.favorite)
    }

    fn entry_mut(&mut self, game: &GameId) -> Option<&mut HistoryEntry> {
        self.file
            .entries
            .iter_mut()
            .find(|e| e.game_id == game.as_str())
    }
}

/// Coarse "how long ago" label for history listings.
pub fn format_age(now_ms: i64, then_ms: i64) -> String {
    let minutes = now_ms.saturating_sub(then_ms) / 60_000;
    match minutes {
        0 => "just now".to_string(),
        1..=59 => format!("{minutes}m ago"),
        60..=1439 => format!("{}h ago", minutes / 60),
        _ => format!("{}d ago", minutes / 1440),
    }
}
