/// Environment variable naming the fastANI executable to use instead of
/// the one found on `PATH`.
pub const FASTANI_BIN_ENV: &str = "ANICACHE_FASTANI_BIN";

/// Newly computed records are committed in groups of this many.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Reported by fastANI releases older than 1.3, which have no `-v` flag.
pub const LEGACY_VERSION: &str = "unknown (<1.3)";

pub const ANI_AF_FILE: &str = "ani_af.tsv";
pub const ANI_MATRIX_FILE: &str = "ani_matrix.tsv";
pub const AF_MATRIX_FILE: &str = "af_matrix.tsv";
