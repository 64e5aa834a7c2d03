//! Persisted layout constants.

/// Version of the table layout written by this crate. Stores carrying any
/// other value are refused.
pub const SCHEMA_VERSION: u32 = 1;

pub const META_KEY_SCHEMA_VERSION: &str = "schema_version";
pub const META_KEY_CREATED_BY: &str = "created_by";

/// Version string recorded in new stores.
pub const ANICACHE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long a connection waits on another process' write lock.
pub const BUSY_TIMEOUT_SECS: u64 = 30;

/// Keys looked up per statement in `get_many`; three parameters each.
pub const LOOKUP_CHUNK: usize = 256;
