//! # anicache
//!
//! A persistent, shareable cache for pairwise ANI (Average Nucleotide
//! Identity) computations. Each component lives in its own crate and is
//! re-exported here behind a feature of the same name:
//!
//! - `core` - data model and errors
//! - `digest` - genome fingerprints and pair keys
//! - `store` - the SQLite cache store and the merge engine
//! - `engine` - the batch scheduler and the fastANI oracle

#[cfg(feature = "core")]
#[doc(inline)]
pub use anicache_core as core;

#[cfg(feature = "digest")]
#[doc(inline)]
pub use anicache_digest as digest;

#[cfg(feature = "store")]
#[doc(inline)]
pub use anicache_store as store;

#[cfg(feature = "engine")]
#[doc(inline)]
pub use anicache_engine as engine;
