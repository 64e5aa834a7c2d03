//! Merging two independently built stores.
//!
//! For a key present on both sides the newer record wins. When both were
//! computed at the same instant the record with the larger
//! `(ani, af, aligned_fragments, total_fragments)` wins, which keeps the
//! outcome independent of argument order. Whatever is discarded is listed
//! in the [MergeReport].

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::path::Path;

use anicache_core::consts::ANI_TOLERANCE;
use anicache_core::errors::{AniCacheError, Result};
use anicache_core::models::{CacheRecord, PairKey};

use crate::store::{CacheStore, WriteMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// The kept record was computed later.
    NewerTimestamp,
    /// Same timestamp; the kept record compares larger.
    TieBreak,
}

impl Display for ConflictReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConflictReason::NewerTimestamp => write!(f, "newer timestamp"),
            ConflictReason::TieBreak => write!(f, "tie-break on equal timestamps"),
        }
    }
}

/// One key whose two records disagreed.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeConflict {
    pub key: PairKey,
    pub kept: CacheRecord,
    pub discarded: CacheRecord,
    pub reason: ConflictReason,
}

impl Display for MergeConflict {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: kept ANI {} (AF {}, {}) over ANI {} (AF {}, {}); {}",
            self.key,
            self.kept.ani,
            self.kept.aligned_fraction,
            self.kept.computed_at.to_rfc3339(),
            self.discarded.ani,
            self.discarded.aligned_fraction,
            self.discarded.computed_at.to_rfc3339(),
            self.reason
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    /// Keys only the left store had.
    pub from_left: usize,
    /// Keys only the right store had.
    pub from_right: usize,
    /// Keys both had with the same measurement.
    pub identical: usize,
    pub conflicts: Vec<MergeConflict>,
}

impl MergeReport {
    pub fn total(&self) -> usize {
        self.from_left + self.from_right + self.identical + self.conflicts.len()
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

fn measurement_order(a: &CacheRecord, b: &CacheRecord) -> Ordering {
    a.ani
        .total_cmp(&b.ani)
        .then(a.aligned_fraction.total_cmp(&b.aligned_fraction))
        .then(a.aligned_fragments.cmp(&b.aligned_fragments))
        .then(a.total_fragments.cmp(&b.total_fragments))
}

/// Pick the surviving record. `true` means `right` wins.
fn right_wins(left: &CacheRecord, right: &CacheRecord) -> (bool, ConflictReason) {
    match left.computed_at.cmp(&right.computed_at) {
        Ordering::Less => (true, ConflictReason::NewerTimestamp),
        Ordering::Greater => (false, ConflictReason::NewerTimestamp),
        Ordering::Equal => (
            measurement_order(left, right) == Ordering::Less,
            ConflictReason::TieBreak,
        ),
    }
}

///
/// Merge two record sets. Neither input is modified; the merged set is
/// returned in key order together with the report.
///
pub fn merge_records(
    left: &[(PairKey, CacheRecord)],
    right: &[(PairKey, CacheRecord)],
) -> (Vec<(PairKey, CacheRecord)>, MergeReport) {
    let mut report = MergeReport::default();
    let mut merged: BTreeMap<PairKey, CacheRecord> =
        left.iter().map(|(k, r)| (k.clone(), r.clone())).collect();
    report.from_left = merged.len();

    for (key, incoming) in right {
        let Some(existing) = merged.get_mut(key) else {
            merged.insert(key.clone(), incoming.clone());
            report.from_right += 1;
            continue;
        };
        report.from_left -= 1;

        let (take_right, reason) = right_wins(existing, incoming);
        if existing.same_measurement(incoming, ANI_TOLERANCE) {
            report.identical += 1;
            if take_right {
                *existing = incoming.clone();
            }
            continue;
        }

        let (kept, discarded) = if take_right {
            (incoming.clone(), std::mem::replace(existing, incoming.clone()))
        } else {
            (existing.clone(), incoming.clone())
        };
        log::warn!(
            "Conflicting records for {}: keeping ANI {} over {} ({})",
            key,
            kept.ani,
            discarded.ani,
            reason
        );
        report.conflicts.push(MergeConflict {
            key: key.clone(),
            kept,
            discarded,
            reason,
        });
    }

    report.conflicts.sort_by(|a, b| a.key.cmp(&b.key));
    (merged.into_iter().collect(), report)
}

fn same_location(a: &CacheStore, b: &CacheStore) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }
    match (a.location(), b.location()) {
        (Some(a), Some(b)) => match (a.canonicalize(), b.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => a == b,
        },
        _ => false,
    }
}

///
/// Merge `left` and `right` into `dest`.
///
/// Records already in `dest` take part as a third source under the same
/// policy, and their conflicts are reported too. The destination is
/// written in one transaction.
///
/// # Errors
///
/// `StoreUnavailable` if `dest` is one of the inputs, is read-only, or any
/// store fails.
///
pub fn merge_stores(left: &CacheStore, right: &CacheStore, dest: &CacheStore) -> Result<MergeReport> {
    if same_location(left, dest) || same_location(right, dest) {
        return Err(AniCacheError::StoreUnavailable(
            "merge destination must differ from both inputs".to_string(),
        ));
    }
    if dest.is_read_only() {
        return Err(AniCacheError::StoreUnavailable(
            "merge destination was opened read-only".to_string(),
        ));
    }

    let left_records = left.records()?;
    let right_records = right.records()?;
    log::info!(
        "Merging {} + {} records",
        left_records.len(),
        right_records.len()
    );
    let (mut merged, mut report) = merge_records(&left_records, &right_records);

    let existing = dest.records()?;
    if !existing.is_empty() {
        log::info!(" - destination already holds {} records", existing.len());
        let (with_existing, dest_report) = merge_records(&existing, &merged);
        report.conflicts.extend(dest_report.conflicts);
        report.conflicts.sort_by(|a, b| a.key.cmp(&b.key));
        merged = with_existing;
    }

    let outcome = dest.put_many(&merged, WriteMode::Upsert)?;
    if let Some((key, err)) = outcome.rejected.into_iter().next() {
        return Err(AniCacheError::InvalidRecord(format!("{}: {}", key, err)));
    }

    log::info!(
        " - {} from left, {} from right, {} identical, {} conflicts",
        report.from_left,
        report.from_right,
        report.identical,
        report.conflicts.len()
    );
    Ok(report)
}

///
/// Merge the stores at `left` and `right` into a new store at `dest`.
/// Inputs are opened read-only; `dest` must not exist yet.
///
pub fn merge_into_new<P: AsRef<Path>>(left: P, right: P, dest: P) -> Result<(CacheStore, MergeReport)> {
    let dest = dest.as_ref();
    if dest.exists() {
        return Err(AniCacheError::StoreUnavailable(format!(
            "merge destination {} already exists",
            dest.display()
        )));
    }
    let left = CacheStore::open_read_only(left)?;
    let right = CacheStore::open_read_only(right)?;
    let merged = CacheStore::open(dest)?;
    let report = merge_stores(&left, &right, &merged)?;
    Ok((merged, report))
}
