use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{dao::models::GameStateDoc, ident::GameId};

pub const BOARD_PREFIX: &str = "board::";
pub const NAME_PREFIX: &str = "name::";

/// Scoreboard state wrapped in CouchDB's document envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchBoardDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub state: GameStateDoc,
}

impl CouchBoardDocument {
    pub fn new(game: &GameId, state: GameStateDoc) -> Self {
        Self {
            id: board_doc_id(game),
            rev: None,
            state,
        }
    }
}

/// Friendly-name record kept alongside the board document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchNameDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub name: String,
}

pub fn board_doc_id(game: &GameId) -> String {
    format!("{}{}", BOARD_PREFIX, game)
}

pub fn name_doc_id(game: &GameId) -> String {
    format!("{}{}", NAME_PREFIX, game)
}

/// One page of the `_changes` feed.
#[derive(Debug, Deserialize)]
pub struct ChangesResponse {
    pub results: Vec<ChangeRow>,
    pub last_seq: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRow {
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub doc: Option<Value>,
}
