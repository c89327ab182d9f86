//! # sync-core
//!
//! Pure logic for subsync (no I/O, instant tests).
//!
//! This crate implements the decision logic of the coordinator without any
//! channels, timers or tasks, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects:
//! - [`QueryState`] turns subscription, reachability and timer signals into
//!   resolution actions for one sync query
//! - [`SyncSignals`] folds session and reachability changes into a
//!   [`SyncStatus`](subsync_types::SyncStatus)
//!
//! The actual listening (watch channels, timers, spawned tasks) is performed
//! by `sync-client`, which interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod resolution;
pub mod status;

pub use resolution::{Action, Event, QueryState, Resolution, DEFAULT_QUERY_TIMEOUT};
pub use status::{SignalChange, SyncSignals};
