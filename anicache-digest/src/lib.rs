//! # Genome identity for anicache
//!
//! Derives stable identities for genomes and genome pairs.
//!
//! - `algorithms` - sha512t24u digests and RFC-8785 canonical JSON
//! - `fasta` - canonicalising FASTA reader (headers, case, wrapping and
//!   sequence order do not affect the result)
//! - `resolver` - [GenomeResolver], which fingerprints genome files once per run
//! - `pair` - [PairKeyBuilder], which folds two fingerprints and a config
//!   into a [PairKey](anicache_core::models::PairKey)

pub mod algorithms;
pub mod fasta;
pub mod pair;
pub mod resolver;

pub use algorithms::{canonicalize_json, sha512t24u};
pub use fasta::{SequenceDigest, digest_sequences};
pub use pair::{PairKeyBuilder, build_pair_key, config_digest};
pub use resolver::{GenomeResolver, genome_digest_from_sequences};
