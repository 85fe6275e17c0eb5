//! CouchDB-backed [`BoardStore`](crate::dao::store::BoardStore) using the
//! longpoll `_changes` feed for snapshot delivery.

mod config;
mod error;
mod models;
mod store;

pub use config::CouchConfig;
pub use error::{CouchDaoError, CouchResult};
pub use store::CouchBoardStore;
