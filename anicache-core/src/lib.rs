//! # Core types for anicache
//!
//! Shared data model used by every anicache crate: genome handles and their
//! content digests, comparison configurations, canonical pair keys and the
//! cached ANI records themselves. Also holds the error enum and a few
//! reader helpers.

pub mod consts;
pub mod errors;
pub mod models;
pub mod utils;

pub use errors::{AniCacheError, Result};
