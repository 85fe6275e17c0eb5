//! Game identifiers: sanitizing, generating, and resolving them.

use std::fmt;
use std::sync::Arc;

use rand::Rng;

/// The game every client lands on when nothing else names one.
pub const DEFAULT_GAME_ID: &str = "main";

const GENERATED_LEN: usize = 6;
const GENERATED_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A sanitized game identifier.
///
/// Construction always goes through [`GameId::sanitize`], so a held value is
/// guaranteed lowercase and restricted to `[a-z0-9_-]`. Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GameId(Arc<str>);

impl GameId {
    /// Sanitize arbitrary input into a game id: characters outside
    /// `[A-Za-z0-9_-]` are dropped and the rest is lowercased. Returns `None`
    /// when nothing survives.
    pub fn sanitize(raw: &str) -> Option<Self> {
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        if cleaned.is_empty() {
            None
        } else {
            Some(GameId(cleaned.into()))
        }
    }

    /// Mint a fresh shareable id of the form `game-XXXXXX`.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let suffix: String = (0..GENERATED_LEN)
            .map(|_| {
                let idx = rng.random_range(0..GENERATED_ALPHABET.len());
                GENERATED_ALPHABET[idx] as char
            })
            .collect();
        // Sanitizing lowercases the suffix and cannot fail on this alphabet.
        GameId(format!("game-{}", suffix.to_ascii_lowercase()).into())
    }

    /// Pick the game to join: an explicit request wins, then the last game
    /// this device used, then [`DEFAULT_GAME_ID`]. Unsanitizable input at any
    /// step falls through to the next.
    pub fn resolve(explicit: Option<&str>, last_used: Option<&str>) -> Self {
        explicit
            .and_then(Self::sanitize)
            .or_else(|| last_used.and_then(Self::sanitize))
            .unwrap_or_else(|| GameId(DEFAULT_GAME_ID.into()))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_lowercases_and_strips() {
        let id = GameId::sanitize("Friday Night! Game #2").unwrap();
        assert_eq!(id.as_str(), "fridaynightgame2");

        let id = GameId::sanitize("rink-B_7").unwrap();
        assert_eq!(id.as_str(), "rink-b_7");
    }

    #[test]
    fn sanitize_rejects_empty_results() {
        assert_eq!(GameId::sanitize(""), None);
        assert_eq!(GameId::sanitize("!!! ???"), None);
    }

    #[test]
    fn generated_ids_have_expected_shape() {
        for _ in 0..32 {
            let id = GameId::generate();
            let s = id.as_str();
            assert_eq!(s.len(), "game-".len() + GENERATED_LEN);
            assert!(s.starts_with("game-"));
            assert!(
                s["game-".len()..]
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            );
        }
    }

    #[test]
    fn resolve_prefers_explicit_then_last_used() {
        assert_eq!(
            GameId::resolve(Some("Rink-A"), Some("old")).as_str(),
            "rink-a"
        );
        assert_eq!(GameId::resolve(None, Some("old")).as_str(), "old");
        assert_eq!(GameId::resolve(None, None).as_str(), DEFAULT_GAME_ID);
        // Garbage explicit input falls through instead of erroring.
        assert_eq!(GameId::resolve(Some("???"), None).as_str(), DEFAULT_GAME_ID);
    }
}
