//! Integration tests for genome fingerprinting through the public API.
//!
//! Equivalent representations of the same genome (other file name, other
//! headers, reordered records, re-wrapped lines, mixed case, gzip) must all
//! resolve to one digest.

use std::fs::{File, write};
use std::io::Write;
use std::path::{Path, PathBuf};

use anicache_core::errors::AniCacheError;
use anicache_core::models::Genome;
use anicache_digest::GenomeResolver;
use flate2::Compression;
use flate2::write::GzEncoder;
use rstest::{fixture, rstest};
use tempfile::{TempDir, tempdir};

const CHR1: &str = "ACGTTGCAACGTTGCAACGTAAAACCCCGGGGTTTT";
const CHR2: &str = "TTTTGGGGCCCCAAAA";

#[fixture]
fn workdir() -> TempDir {
    tempdir().expect("Failed to create temporary directory")
}

fn write_fasta(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    write(&path, content).expect("Failed to write FASTA");
    path
}

fn canonical_fasta() -> String {
    format!(">chr1\n{}\n>chr2\n{}\n", CHR1, CHR2)
}

#[rstest]
fn test_fingerprint_is_stable(workdir: TempDir) {
    let path = write_fasta(workdir.path(), "g.fna", &canonical_fasta());
    let resolver = GenomeResolver::new();
    let first = resolver.fingerprint(&Genome::from_path(&path)).unwrap();

    // a fresh resolver has no memory of the first run
    let second = GenomeResolver::new()
        .fingerprint(&Genome::from_path(&path))
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(first.as_str().len(), 32);
}

#[rstest]
#[case::reordered(format!(">chr2\n{}\n>chr1\n{}\n", CHR2, CHR1))]
#[case::rewrapped(format!(">chr1\n{}\n{}\n>chr2\n{}\n", &CHR1[..10], &CHR1[10..], CHR2))]
#[case::lower_case(format!(">chr1\n{}\n>chr2\n{}\n", CHR1.to_lowercase(), CHR2))]
#[case::other_headers(format!(">NC_000001.1 Homo sapiens\n{}\n>contig_b len=16\n{}\n", CHR1, CHR2))]
fn test_equivalent_representations(workdir: TempDir, #[case] variant: String) {
    let resolver = GenomeResolver::new();
    let original = write_fasta(workdir.path(), "original.fna", &canonical_fasta());
    let other = write_fasta(workdir.path(), "renamed_copy.fasta", &variant);

    let a = resolver.fingerprint(&Genome::from_path(&original)).unwrap();
    let b = resolver.fingerprint(&Genome::from_path(&other)).unwrap();
    assert_eq!(a, b);
}

#[rstest]
fn test_gzipped_copy_matches(workdir: TempDir) {
    let plain = write_fasta(workdir.path(), "plain.fna", &canonical_fasta());
    let gz_path = workdir.path().join("copy.fna.gz");
    let mut encoder = GzEncoder::new(File::create(&gz_path).unwrap(), Compression::default());
    encoder.write_all(canonical_fasta().as_bytes()).unwrap();
    encoder.finish().unwrap();

    let resolver = GenomeResolver::new();
    assert_eq!(
        resolver.fingerprint(&Genome::from_path(&plain)).unwrap(),
        resolver.fingerprint(&Genome::from_path(&gz_path)).unwrap()
    );
}

#[rstest]
fn test_different_content_differs(workdir: TempDir) {
    let a = write_fasta(workdir.path(), "a.fna", &canonical_fasta());
    let b = write_fasta(workdir.path(), "b.fna", &format!(">chr1\n{}\n", CHR1));

    let resolver = GenomeResolver::new();
    assert_ne!(
        resolver.fingerprint(&Genome::from_path(&a)).unwrap(),
        resolver.fingerprint(&Genome::from_path(&b)).unwrap()
    );
}

#[rstest]
fn test_resolver_remembers_paths(workdir: TempDir) {
    let path = write_fasta(workdir.path(), "g.fna", &canonical_fasta());
    let genome = Genome::from_path(&path);
    let resolver = GenomeResolver::new();
    let before = resolver.fingerprint(&genome).unwrap();
    assert_eq!(resolver.len(), 1);

    // within one run the content is not re-read
    write(&path, ">changed\nAAAA\n").unwrap();
    assert_eq!(resolver.fingerprint(&genome).unwrap(), before);
    assert_eq!(resolver.len(), 1);
}

#[rstest]
fn test_unreadable_genomes(workdir: TempDir) {
    let garbage = write_fasta(workdir.path(), "garbage.fna", "this is not a genome\n");
    let missing = workdir.path().join("missing.fna");
    let resolver = GenomeResolver::new();

    let results = resolver.fingerprint_all(&[
        Genome::from_path(&garbage),
        Genome::from_path(&missing),
    ]);
    assert_eq!(results.len(), 2);
    for (result, label) in results.iter().zip(["garbage.fna", "missing.fna"]) {
        match result {
            Err(AniCacheError::UnreadableGenome { label: l, .. }) => assert_eq!(l, label),
            other => panic!("expected UnreadableGenome, got {other:?}"),
        }
    }
    assert!(resolver.is_empty());
}
