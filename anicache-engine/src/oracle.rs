//! The external comparison tool, seen from the cache.
//!
//! The scheduler only needs "compare these two genomes under this config";
//! [Oracle] is that seam. [FastAniOracle] runs the fastANI executable, and
//! any closure with the right signature is an oracle too, which is how the
//! tests count and fail invocations.

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use anicache_core::consts::{FASTANI_TOOL, UNKNOWN_TOOL_VERSION};
use anicache_core::errors::{AniCacheError, Result};
use anicache_core::models::{CacheRecord, ComparisonConfig, Genome};

use crate::consts::{FASTANI_BIN_ENV, LEGACY_VERSION};

/// Raw numbers from one comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OracleOutput {
    pub ani: f64,
    pub aligned_fraction: f64,
    pub aligned_fragments: u64,
    pub total_fragments: u64,
}

impl OracleOutput {
    /// No alignment at all, which is what fastANI reports below its
    /// identity threshold.
    pub fn unrelated() -> Self {
        OracleOutput {
            ani: 0.0,
            aligned_fraction: 0.0,
            aligned_fragments: 0,
            total_fragments: 0,
        }
    }

    pub fn into_record(self, config: &ComparisonConfig) -> CacheRecord {
        CacheRecord::new(
            self.ani,
            self.aligned_fraction,
            self.aligned_fragments,
            self.total_fragments,
            config.clone(),
        )
    }
}

pub trait Oracle: Sync {
    ///
    /// Compare `query` against `reference`.
    ///
    /// Failures should be `ComputationFailed`; they are reported for this
    /// pair only and never cached.
    ///
    fn compare(
        &self,
        query: &Genome,
        reference: &Genome,
        config: &ComparisonConfig,
    ) -> Result<OracleOutput>;
}

impl<F> Oracle for F
where
    F: Fn(&Genome, &Genome, &ComparisonConfig) -> Result<OracleOutput> + Sync,
{
    fn compare(
        &self,
        query: &Genome,
        reference: &Genome,
        config: &ComparisonConfig,
    ) -> Result<OracleOutput> {
        self(query, reference, config)
    }
}

///
/// Parse what fastANI writes for a single query/reference pair.
///
/// One line of five columns (`query reference ani matched total`) or
/// nothing at all when the genomes are too distant to align.
///
pub fn parse_fastani_output(stdout: &str) -> std::result::Result<OracleOutput, String> {
    let tokens: Vec<&str> = stdout.split_whitespace().collect();
    match tokens.len() {
        0 => Ok(OracleOutput::unrelated()),
        5 => {
            let ani = tokens[2]
                .parse::<f64>()
                .map_err(|_| format!("ANI is not a number: {}", tokens[2]))?;
            let aligned_fragments = tokens[3]
                .parse::<u64>()
                .map_err(|_| format!("fragment count is not an integer: {}", tokens[3]))?;
            let total_fragments = tokens[4]
                .parse::<u64>()
                .map_err(|_| format!("fragment count is not an integer: {}", tokens[4]))?;
            let aligned_fraction = if total_fragments == 0 {
                0.0
            } else {
                aligned_fragments as f64 / total_fragments as f64
            };
            Ok(OracleOutput {
                ani,
                aligned_fraction,
                aligned_fragments,
                total_fragments,
            })
        }
        _ => Err(format!("Unexpected stdout from fastANI: {}", stdout.trim())),
    }
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    find_executable_in(&env::var_os("PATH")?, name)
}

/// First `name` in the `PATH`-style list `paths` that may be executed.
fn find_executable_in(paths: &OsStr, name: &str) -> Option<PathBuf> {
    env::split_paths(paths)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Pull the version out of `fastANI -v` output.
fn parse_version(stderr: &str) -> String {
    if stderr.starts_with("Unknown option:") {
        return LEGACY_VERSION.to_string();
    }
    stderr
        .lines()
        .find_map(|line| line.split_once("version ").map(|(_, v)| v.trim().to_string()))
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| UNKNOWN_TOOL_VERSION.to_string())
}

///
/// Runs fastANI once per pair:
///
/// ```text
/// fastANI -q <query> -r <reference> -o /dev/stdout --fragLen F --minFraction M -k K
/// ```
///
/// Entries of `config.extra` are passed through as `--<key> <value>`.
///
#[derive(Debug, Clone)]
pub struct FastAniOracle {
    executable: PathBuf,
    version: String,
}

impl FastAniOracle {
    ///
    /// Find fastANI via `ANICACHE_FASTANI_BIN` or on `PATH`, and detect its
    /// version.
    ///
    pub fn locate() -> Result<Self> {
        let executable = match env::var_os(FASTANI_BIN_ENV) {
            Some(bin) => PathBuf::from(bin),
            None => find_on_path(FASTANI_TOOL).ok_or_else(|| {
                AniCacheError::InvalidConfig(format!(
                    "{} was not found on PATH (set {} to override)",
                    FASTANI_TOOL, FASTANI_BIN_ENV
                ))
            })?,
        };
        let oracle = Self::with_executable(executable);
        log::info!("Using FastANI v{}.", oracle.version());
        Ok(oracle)
    }

    pub fn with_executable<P: Into<PathBuf>>(executable: P) -> Self {
        let executable = executable.into();
        let version = Self::detect_version(&executable);
        FastAniOracle {
            executable,
            version,
        }
    }

    fn detect_version(executable: &Path) -> String {
        match Command::new(executable).arg("-v").output() {
            Ok(output) => parse_version(&String::from_utf8_lossy(&output.stderr)),
            Err(e) => {
                log::warn!("Could not run {} -v: {}", executable.display(), e);
                UNKNOWN_TOOL_VERSION.to_string()
            }
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    fn command(&self, query: &Genome, reference: &Genome, config: &ComparisonConfig) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg("-q")
            .arg(&query.path)
            .arg("-r")
            .arg(&reference.path)
            .arg("-o")
            .arg("/dev/stdout")
            .arg("--fragLen")
            .arg(config.fragment_length.to_string())
            .arg("--minFraction")
            .arg(config.min_fraction.to_string())
            .arg("-k")
            .arg(config.kmer_size.to_string());
        for (key, value) in &config.extra {
            cmd.arg(format!("--{}", key)).arg(value);
        }
        cmd
    }
}

impl Oracle for FastAniOracle {
    fn compare(
        &self,
        query: &Genome,
        reference: &Genome,
        config: &ComparisonConfig,
    ) -> Result<OracleOutput> {
        let failed = |reason: String| AniCacheError::ComputationFailed {
            query: query.label.clone(),
            reference: reference.label.clone(),
            reason,
        };
        if config.tool != FASTANI_TOOL {
            return Err(failed(format!(
                "config is for '{}', not {}",
                config.tool, FASTANI_TOOL
            )));
        }

        let output = self
            .command(query, reference, config)
            .output()
            .map_err(|e| failed(format!("could not run {}: {}", self.executable.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let detail = if stderr.is_empty() {
                format!("exit status {}", output.status)
            } else {
                format!("{} ({})", output.status, stderr)
            };
            return Err(failed(format!("FastANI exited with {}", detail)));
        }

        parse_fastani_output(&String::from_utf8_lossy(&output.stdout)).map_err(failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[cfg(unix)]
    #[test]
    fn test_path_lookup_skips_non_executable() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let plain = first.path().join(FASTANI_TOOL);
        fs::write(&plain, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&plain, fs::Permissions::from_mode(0o644)).unwrap();
        let runnable = second.path().join(FASTANI_TOOL);
        fs::write(&runnable, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&runnable, fs::Permissions::from_mode(0o755)).unwrap();

        let paths = env::join_paths([first.path(), second.path()]).unwrap();
        assert_eq!(find_executable_in(&paths, FASTANI_TOOL), Some(runnable));
        let only_plain = env::join_paths([first.path()]).unwrap();
        assert_eq!(find_executable_in(&only_plain, FASTANI_TOOL), None);
    }

    #[test]
    fn test_parse_single_result_line() {
        let out = parse_fastani_output("q.fna\tr.fna\t98.7654\t37\t40\n").unwrap();
        assert_eq!(
            out,
            OracleOutput {
                ani: 98.7654,
                aligned_fraction: 37.0 / 40.0,
                aligned_fragments: 37,
                total_fragments: 40,
            }
        );
    }

    #[test]
    fn test_parse_empty_output_is_unrelated() {
        assert_eq!(parse_fastani_output("  \n").unwrap(), OracleOutput::unrelated());
    }

    #[rstest]
    #[case("q.fna r.fna 98.1 37")]
    #[case("q.fna r.fna NaNish 37 40")]
    #[case("q r 98.1 37 40\nq r 97.0 30 40")]
    fn test_parse_rejects_malformed_output(#[case] stdout: &str) {
        assert!(parse_fastani_output(stdout).is_err());
    }

    #[rstest]
    #[case("fastANI version 1.33\n", "1.33")]
    #[case("Unknown option: v\nUsage ...", LEGACY_VERSION)]
    #[case("", UNKNOWN_TOOL_VERSION)]
    fn test_parse_version(#[case] stderr: &str, #[case] expected: &str) {
        assert_eq!(parse_version(stderr), expected);
    }

    #[test]
    fn test_command_line() {
        let oracle = FastAniOracle {
            executable: PathBuf::from("fastANI"),
            version: "1.33".to_string(),
        };
        let mut config = ComparisonConfig::default();
        config.extra.insert("threads".to_string(), "1".to_string());
        let cmd = oracle.command(
            &Genome::from_path("/data/q.fna"),
            &Genome::from_path("/data/r.fna"),
            &config,
        );
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-q", "/data/q.fna", "-r", "/data/r.fna", "-o", "/dev/stdout", "--fragLen",
                "3000", "--minFraction", "0.2", "-k", "16", "--threads", "1",
            ]
        );
    }

    #[test]
    fn test_closure_is_an_oracle() {
        let oracle = |_: &Genome, _: &Genome, _: &ComparisonConfig| -> Result<OracleOutput> {
            Ok(OracleOutput::unrelated())
        };
        let g = Genome::from_path("g.fna");
        assert_eq!(
            oracle.compare(&g, &g, &ComparisonConfig::default()).unwrap(),
            OracleOutput::unrelated()
        );
    }

    #[test]
    fn test_missing_executable_fails_the_pair() {
        let oracle = FastAniOracle::with_executable("/nonexistent/fastANI");
        assert_eq!(oracle.version(), UNKNOWN_TOOL_VERSION);
        let g = Genome::from_path("g.fna");
        let err = oracle
            .compare(&g, &g, &ComparisonConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, AniCacheError::ComputationFailed { .. }));
    }
}
