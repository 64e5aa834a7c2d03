use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::read_to_string;
use std::path::Path;

use crate::consts::{
    DEFAULT_FRAGMENT_LENGTH, DEFAULT_KMER_SIZE, DEFAULT_MIN_FRACTION, FASTANI_TOOL, UNKNOWN_TOOL_VERSION,
};
use crate::errors::{AniCacheError, Result};

///
/// Every parameter that changes the meaning of an ANI value.
///
/// Results computed under two configs that differ in any field are never
/// comparable, so the whole struct is hashed into the pair key.
/// `symmetric` declares whether the tool gives the same answer for A-vs-B
/// and B-vs-A under this config; when it does, pair keys are folded.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComparisonConfig {
    pub tool: String,
    pub tool_version: String,
    pub kmer_size: u32,
    pub fragment_length: u32,
    pub min_fraction: f64,
    pub symmetric: bool,
    pub extra: BTreeMap<String, String>,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        ComparisonConfig {
            tool: FASTANI_TOOL.to_string(),
            tool_version: UNKNOWN_TOOL_VERSION.to_string(),
            kmer_size: DEFAULT_KMER_SIZE,
            fragment_length: DEFAULT_FRAGMENT_LENGTH,
            min_fraction: DEFAULT_MIN_FRACTION,
            // fastANI maps query fragments onto the reference, so the two
            // directions can disagree
            symmetric: false,
            extra: BTreeMap::new(),
        }
    }
}

impl ComparisonConfig {
    pub fn with_tool_version<S: Into<String>>(mut self, version: S) -> Self {
        self.tool_version = version.into();
        self
    }

    pub fn with_symmetric(mut self, symmetric: bool) -> Self {
        self.symmetric = symmetric;
        self
    }

    /// Parse a config from TOML text. Missing fields take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ComparisonConfig =
            toml::from_str(text).map_err(|e| AniCacheError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file on disk.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = read_to_string(path).map_err(|e| {
            AniCacheError::InvalidConfig(format!("can't read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tool.trim().is_empty() {
            return Err(AniCacheError::InvalidConfig("tool name is empty".to_string()));
        }
        if self.kmer_size == 0 || self.fragment_length == 0 {
            return Err(AniCacheError::InvalidConfig(
                "kmer_size and fragment_length must be positive".to_string(),
            ));
        }
        if !self.min_fraction.is_finite() || !(0.0..=1.0).contains(&self.min_fraction) {
            return Err(AniCacheError::InvalidConfig(format!(
                "min_fraction must lie in [0, 1], got {}",
                self.min_fraction
            )));
        }
        Ok(())
    }
}
