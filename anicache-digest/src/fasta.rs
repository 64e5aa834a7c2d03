//! Canonicalising FASTA reader.
//!
//! Each record is reduced to the digest of its residues only: header text,
//! line wrapping, surrounding whitespace and letter case are dropped before
//! hashing. Records with no residues are skipped.

use sha2::{Digest, Sha512};
use std::io::BufRead;

use crate::algorithms::finalize_t24u;

/// IUPAC nucleotide codes (upper case) accepted in genome sequences.
const NUCLEOTIDE_CODES: &[u8] = b"ACGTUNRYSWKMBDHV";

/// Digest and length of one canonicalised sequence record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SequenceDigest {
    pub sha512t24u: String,
    pub length: usize,
}

struct RecordState {
    hasher: Sha512,
    length: usize,
}

impl RecordState {
    fn new() -> Self {
        RecordState {
            hasher: Sha512::new(),
            length: 0,
        }
    }

    fn finish(&mut self, out: &mut Vec<SequenceDigest>) {
        if self.length > 0 {
            out.push(SequenceDigest {
                sha512t24u: finalize_t24u(&mut self.hasher),
                length: self.length,
            });
        } else {
            self.hasher.reset();
        }
        self.length = 0;
    }
}

///
/// Read a FASTA stream and return one digest per non-empty record, in file
/// order.
///
/// Errors are returned as a human readable reason; the caller attaches the
/// genome label.
///
/// # Arguments
///
/// - reader: FASTA content, already decompressed
///
pub fn digest_sequences<R: BufRead>(mut reader: R) -> Result<Vec<SequenceDigest>, String> {
    let mut results = Vec::new();
    let mut state = RecordState::new();
    let mut in_record = false;
    let mut line = Vec::new();
    let mut line_no = 0usize;
    let mut upper = Vec::new();

    loop {
        line.clear();
        let bytes_read = reader
            .read_until(b'\n', &mut line)
            .map_err(|e| format!("read error: {}", e))?;
        if bytes_read == 0 {
            break;
        }
        line_no += 1;

        let trimmed = line.trim_ascii();
        if trimmed.is_empty() || trimmed[0] == b';' {
            continue;
        }

        if trimmed[0] == b'>' {
            if in_record {
                state.finish(&mut results);
            }
            in_record = true;
            continue;
        }

        if !in_record {
            return Err(format!(
                "line {}: sequence data before the first '>' header; not FASTA",
                line_no
            ));
        }

        upper.clear();
        for &b in trimmed {
            if b.is_ascii_whitespace() {
                continue;
            }
            let c = b.to_ascii_uppercase();
            if !NUCLEOTIDE_CODES.contains(&c) {
                return Err(format!(
                    "line {}: invalid nucleotide symbol {:?}",
                    line_no,
                    char::from(b)
                ));
            }
            upper.push(c);
        }
        state.hasher.update(&upper);
        state.length += upper.len();
    }

    if in_record {
        state.finish(&mut results);
    }

    if results.is_empty() {
        return Err("no sequence records found".to_string());
    }

    Ok(results)
}
