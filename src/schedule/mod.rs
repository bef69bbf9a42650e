// src/schedule/mod.rs

//! When workers wake up.
//!
//! - [`scheduler`] decides which interval-scheduled worker types are due.
//! - [`events`] maps event names to the worker types they wake.

pub mod events;
pub mod scheduler;

pub use events::EventTable;
pub use scheduler::{DueReason, DueWorker, Schedule};
