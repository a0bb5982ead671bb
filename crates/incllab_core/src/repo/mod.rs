//! Persistence layer: the Store contract and its SQLite implementation.
//!
//! # Responsibility
//! - Define the whole-snapshot load/save contract the session driver
//!   uses.
//! - Keep SQL details and save-time normalization inside the persistence
//!   boundary.
//!
//! # Invariants
//! - A save either fully succeeds or leaves the on-disk tables exactly as
//!   they were.
//! - Loaded snapshots are already in canonical key order.

pub mod store;

pub use store::{InclusionStore, SqliteStore, StoreError, StoreResult};
