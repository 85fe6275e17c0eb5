//! Synchronized hockey scoreboard core.
//!
//! One controller and any number of viewers converge on a shared per-game
//! document in an eventually-consistent store. Timing is anchor-based (the
//! clock is recomputed from a start instant, never decremented), writes are
//! correlated with tokens so a client can tell its own echoes from foreign
//! updates, and everything degrades to local operation when the store is
//! unreachable.

pub mod alarm;
pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
pub mod dao;
pub mod engine;
pub mod error;
pub mod history;
pub mod ident;
pub mod presence;
pub mod state;
pub mod sync;
