use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::path::{Path, PathBuf};

///
/// Genome struct, a handle to the sequence content of one genome on disk.
///
/// The label is for display only and never takes part in identity; two
/// handles with different labels and paths but the same sequence content
/// resolve to the same [GenomeDigest].
///
#[derive(Eq, PartialEq, Hash, Debug, Clone, PartialOrd, Ord)]
pub struct Genome {
    pub label: String,
    pub path: PathBuf,
}

impl Genome {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(label: S, path: P) -> Self {
        Genome {
            label: label.into(),
            path: path.into(),
        }
    }

    ///
    /// Create a genome handle labelled with the file name of `path`.
    ///
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Genome::new(label, path)
    }
}

impl Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

///
/// Content fingerprint of a genome: a sha512t24u digest (32 base64url
/// characters) over its canonicalised sequences.
///
#[derive(Eq, PartialEq, Hash, Debug, Clone, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenomeDigest(String);

impl GenomeDigest {
    pub fn new<S: Into<String>>(digest: S) -> Self {
        GenomeDigest(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for GenomeDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for GenomeDigest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/data/genomes/GCF_000009045.1.fna.gz", "GCF_000009045.1.fna.gz")]
    #[case("relative/GCA_1.fna", "GCA_1.fna")]
    #[case("plain", "plain")]
    fn test_label_from_path(#[case] path: &str, #[case] label: &str) {
        let genome = Genome::from_path(path);
        assert_eq!(genome.label, label);
        assert_eq!(genome.path, PathBuf::from(path));
    }

    #[test]
    fn test_digest_ordering_follows_text() {
        let a = GenomeDigest::new("AAAA");
        let b = GenomeDigest::new("BBBB");
        assert!(a < b);
        assert_eq!(a.to_string(), "AAAA");
    }
}
