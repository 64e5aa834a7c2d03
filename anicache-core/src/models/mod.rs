pub mod config;
pub mod genome;
pub mod pair_key;
pub mod record;

// re-export for cleaner imports
pub use self::config::ComparisonConfig;
pub use self::genome::{Genome, GenomeDigest};
pub use self::pair_key::{Orientation, PairKey};
pub use self::record::CacheRecord;
