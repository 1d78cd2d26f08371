//! muster-store — SQLite persistence for the attendance workflow.
//!
//! Implements the record store, personnel directory, and activity log
//! seams from muster-core over a bundled SQLite database accessed through
//! tokio-rusqlite. The confirmed-event insert re-derives the expected
//! attendance kind inside its write transaction, which is what makes the
//! workflow's optimistic retry loop sound.

mod schema;
mod store;

pub use store::SqliteStore;
