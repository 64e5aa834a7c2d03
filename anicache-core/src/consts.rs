//! Constants shared across the anicache crates.

/// Environment variable overriding the default cache store location.
///
/// ```bash
/// export ANICACHE_DB=/shared/ani/ani_cache.db
/// ```
pub const ANICACHE_DB_ENV: &str = "ANICACHE_DB";

/// Folder created in the home directory when `ANICACHE_DB` is unset.
pub const DEFAULT_CACHE_FOLDER: &str = ".anicache";

/// File name of the default store inside [`DEFAULT_CACHE_FOLDER`].
pub const DEFAULT_STORE_FILE: &str = "ani_cache.db";

/// Name of the default external comparison tool.
pub const FASTANI_TOOL: &str = "fastANI";

/// Tool version recorded when it can't be determined.
pub const UNKNOWN_TOOL_VERSION: &str = "unknown";

/// fastANI default k-mer size.
pub const DEFAULT_KMER_SIZE: u32 = 16;

/// fastANI default fragment length.
pub const DEFAULT_FRAGMENT_LENGTH: u32 = 3000;

/// fastANI default minimum fraction of the genome that must be shared.
pub const DEFAULT_MIN_FRACTION: f64 = 0.2;

/// Two ANI (or AF) values closer than this are considered the same result.
pub const ANI_TOLERANCE: f64 = 1e-9;
