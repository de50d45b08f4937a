//! Directory items under processing.
//!
//! - [`WorkItem`] is the per-run view of one directory entry.
//! - [`ItemArena`] holds the items of one run keyed by id. All mutation goes
//!   through `update(id, fn)` so concurrent tasks never touch an item through
//!   a position captured before a suspension point.
//! - [`ItemStore`] is the backing record store; [`SqliteItemStore`] is the
//!   production implementation.

mod arena;
mod sqlite;
mod store;
mod types;

pub use arena::{ArenaError, ItemArena};
pub use sqlite::SqliteItemStore;
pub use store::{ItemStore, StoreError, ToolEntry, ToolRecord};
pub use types::{ItemStatus, ItemUpdate, WorkItem};
