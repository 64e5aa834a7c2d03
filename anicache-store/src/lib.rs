//! # Persistent ANI cache store
//!
//! - `store` - [CacheStore]: SQLite-backed PairKey -> CacheRecord mapping,
//!   safe to share between processes
//! - `merge` - combine two stores into a destination, reporting conflicts
//! - `dump` - export a store as CSV/TSV

pub mod consts;
pub mod dump;
pub mod merge;
pub mod store;

pub use dump::{dump_store, dump_store_to_path};
pub use merge::{ConflictReason, MergeConflict, MergeReport, merge_into_new, merge_records, merge_stores};
pub use store::{CacheStore, PutManyOutcome, StoreStats, WriteMode};
