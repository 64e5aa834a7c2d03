use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

use super::genome::GenomeDigest;

/// Whether a key was folded into canonical order or keeps its direction.
#[derive(Eq, PartialEq, Hash, Debug, Clone, Copy, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// `genome_a <= genome_b`; both request orders map here.
    Unordered,
    /// `genome_a` is the query, `genome_b` the reference.
    Directed,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Unordered => "unordered",
            Orientation::Directed => "directed",
        }
    }
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unordered" => Ok(Orientation::Unordered),
            "directed" => Ok(Orientation::Directed),
            _ => Err(format!("Unknown pair orientation: {}", s)),
        }
    }
}

///
/// Canonical identity of one cached comparison.
///
/// Built by the pair key builder in `anicache-digest`; a pure function of
/// the two genome digests and the config digest.
///
#[derive(Eq, PartialEq, Hash, Debug, Clone, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub genome_a: GenomeDigest,
    pub genome_b: GenomeDigest,
    pub config_digest: String,
    pub orientation: Orientation,
}

impl PairKey {
    pub fn is_self_comparison(&self) -> bool {
        self.genome_a == self.genome_b
    }
}

impl Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = match self.orientation {
            Orientation::Unordered => "<>",
            Orientation::Directed => "->",
        };
        write!(
            f,
            "{}{}{}@{}",
            self.genome_a, arrow, self.genome_b, self.config_digest
        )
    }
}
