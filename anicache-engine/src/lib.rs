//! # ANI batch engine
//!
//! Turns a list of requested genome comparisons into a complete result
//! table, serving what it can from a [CacheStore](anicache_store::CacheStore)
//! and computing only the missing pairs.
//!
//! - `oracle` - the [Oracle] seam around the external comparison tool, and
//!   the fastANI implementation of it
//! - `scheduler` - [BatchScheduler]: fingerprint, look up, compute, persist
//! - `table` - [AniTable] result tables and their TSV outputs

pub mod consts;
pub mod oracle;
pub mod scheduler;
pub mod table;

pub use oracle::{FastAniOracle, Oracle, OracleOutput, parse_fastani_output};
pub use scheduler::{
    BatchScheduler, PairOutcome, PairRequest, ResolveReport, Resolved, SchedulerOptions, Source,
    plan_comparisons,
};
pub use table::{AniEntry, AniTable, Metric};
