//! Remote document store collaborators and the shared wire document.

#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
pub mod models;
pub mod store;
