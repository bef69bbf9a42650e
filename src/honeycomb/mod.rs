// src/honeycomb/mod.rs

//! Shared JSON documents ("honeycomb") used to coordinate the hive.
//!
//! - [`merge`] holds the pure deep-merge used by every partial update.
//! - [`cache`] keeps parsed documents keyed by their on-disk stamp.
//! - [`store`] implements read / write / update over a [`crate::fs::FileSystem`].

pub mod cache;
pub mod merge;
pub mod store;

pub use cache::DocumentCache;
pub use merge::deep_merge;
pub use store::{
    skeleton, AlertLevel, HoneycombStore, INTEL_DOC, META_KEY, STATE_DOC, TASKS_DOC,
};
