//! Core domain logic for metallographic inclusion studies.
//!
//! This crate is the single source of truth for the two-table inclusion
//! database and its correction invariants: batch import with wholesale
//! slice replacement, circular-specimen recalibration, spatial-division
//! assignment, and the save-time normalization of the store.

pub mod config;
pub mod db;
pub mod geometry;
pub mod interact;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::Tunables;
pub use logging::{default_log_level, init_logging};
pub use model::{
    Calibration, CrossSection, Dataset, Inclusion, InclusionClass, ModelError, SliceKey,
    SliceMeta,
};
pub use repo::{InclusionStore, SqliteStore, StoreError};
pub use service::{ServiceError, ServiceResult};
