//! Postgres persistence for scans.
//!
//! Exposes create-in-PENDING, the atomic `commit_success` / `commit_failure`
//! transitions, and reads that return the full scan with issues in stored order.

pub mod store;

pub use store::{PgScanStore, MAX_LIST_LIMIT};
