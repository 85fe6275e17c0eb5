//! Bidirectional synchronization between the local session and the shared
//! document store.

mod bridge;
mod hub;

pub use bridge::SyncBridge;
pub use hub::{BoardEvent, UpdateHub};

/// What a connected process is allowed to do with the shared document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Full read/write control surface.
    Controller,
    /// Read-only display surface; never writes the shared document.
    Viewer,
}

/// Lifecycle of the link to the document store, for status display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No subscription established.
    Disconnected,
    /// Subscription requested, waiting for the first snapshot.
    Subscribing,
    /// At least one snapshot applied; live.
    Synced,
    /// A foreign snapshot is being folded into the local session.
    Reconciling,
}
