use serde_json::to_value;

use anicache_core::errors::{AniCacheError, Result};
use anicache_core::models::{ComparisonConfig, GenomeDigest, Orientation, PairKey};

use crate::algorithms::{canonicalize_json, sha512t24u};

///
/// Digest of a comparison config.
///
/// The config is serialised to JSON and canonicalised (sorted keys, minimal
/// number formatting) before hashing, so field order and formatting never
/// matter; only values do.
///
pub fn config_digest(config: &ComparisonConfig) -> Result<String> {
    config.validate()?;
    let value = to_value(config).map_err(|e| AniCacheError::InvalidConfig(e.to_string()))?;
    Ok(sha512t24u(canonicalize_json(&value)))
}

///
/// Builds pair keys for one comparison config.
///
/// The config digest is computed once up front. When the config is
/// declared symmetric both request orders fold to the same key; otherwise
/// the key keeps the query first.
///
#[derive(Debug, Clone)]
pub struct PairKeyBuilder {
    config_digest: String,
    symmetric: bool,
}

impl PairKeyBuilder {
    pub fn new(config: &ComparisonConfig) -> Result<Self> {
        Ok(PairKeyBuilder {
            config_digest: config_digest(config)?,
            symmetric: config.symmetric,
        })
    }

    pub fn config_digest(&self) -> &str {
        &self.config_digest
    }

    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    /// Key for comparing `query` against `reference`.
    pub fn build(&self, query: &GenomeDigest, reference: &GenomeDigest) -> PairKey {
        if self.symmetric {
            let (genome_a, genome_b) = if query <= reference {
                (query.clone(), reference.clone())
            } else {
                (reference.clone(), query.clone())
            };
            PairKey {
                genome_a,
                genome_b,
                config_digest: self.config_digest.clone(),
                orientation: Orientation::Unordered,
            }
        } else {
            PairKey {
                genome_a: query.clone(),
                genome_b: reference.clone(),
                config_digest: self.config_digest.clone(),
                orientation: Orientation::Directed,
            }
        }
    }
}

/// One-off form of [PairKeyBuilder::build].
pub fn build_pair_key(
    query: &GenomeDigest,
    reference: &GenomeDigest,
    config: &ComparisonConfig,
) -> Result<PairKey> {
    Ok(PairKeyBuilder::new(config)?.build(query, reference))
}
