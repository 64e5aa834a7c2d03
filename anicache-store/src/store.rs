//! SQLite-backed cache store.
//!
//! The database runs in WAL mode, so readers never wait on writers and any
//! number of processes can share one file. Writes take an IMMEDIATE
//! transaction: one `put_many` call commits as a unit or not at all, and
//! concurrent writers queue on SQLite's lock (bounded by the busy timeout).

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::DateTime;
use parking_lot::Mutex;
use rusqlite::{
    Connection, OpenFlags, OptionalExtension, Row, Transaction, TransactionBehavior, params,
    params_from_iter,
};

use anicache_core::errors::{AniCacheError, Result};
use anicache_core::models::{CacheRecord, ComparisonConfig, GenomeDigest, PairKey};

use crate::consts::{
    ANICACHE_VERSION, BUSY_TIMEOUT_SECS, LOOKUP_CHUNK, META_KEY_CREATED_BY,
    META_KEY_SCHEMA_VERSION, SCHEMA_VERSION,
};

const RECORD_COLUMNS: &str = "genome_a, genome_b, config_digest, orientation, ani, af, \
     aligned_fragments, total_fragments, computed_at, config_json";

const INSERT_IF_ABSENT_SQL: &str = "INSERT OR IGNORE INTO ani_cache (genome_a, genome_b, config_digest, orientation, ani, af, \
     aligned_fragments, total_fragments, computed_at, config_json) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

const UPSERT_SQL: &str = "INSERT INTO ani_cache (genome_a, genome_b, config_digest, orientation, ani, af, \
     aligned_fragments, total_fragments, computed_at, config_json) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
     ON CONFLICT(genome_a, genome_b, config_digest) DO UPDATE SET \
     orientation = excluded.orientation, ani = excluded.ani, af = excluded.af, \
     aligned_fragments = excluded.aligned_fragments, total_fragments = excluded.total_fragments, \
     computed_at = excluded.computed_at, config_json = excluded.config_json";

/// What to do when a record for the key is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the stored record; the later write wins.
    Upsert,
    /// Keep the stored record and drop the new one.
    InsertIfAbsent,
}

/// Result of a batched write.
#[derive(Debug, Default)]
pub struct PutManyOutcome {
    /// Keys whose record is now the one supplied by the caller.
    pub written: Vec<PairKey>,
    /// Keys left untouched because a record already existed (InsertIfAbsent).
    pub skipped: Vec<PairKey>,
    /// Records refused before the transaction started.
    pub rejected: Vec<(PairKey, AniCacheError)>,
}

/// Summary of a store's contents.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreStats {
    pub records: usize,
    pub schema_version: u32,
    pub created_by: Option<String>,
}

impl Display for StoreStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "records:        {}", self.records)?;
        writeln!(f, "schema version: {}", self.schema_version)?;
        write!(
            f,
            "created by:     anicache {}",
            self.created_by.as_deref().unwrap_or("unknown")
        )
    }
}

/// Convert SQLite failures into the fatal store error, keeping some context.
trait OrUnavailable<T> {
    fn or_unavailable(self, what: &str) -> Result<T>;
}

impl<T> OrUnavailable<T> for rusqlite::Result<T> {
    fn or_unavailable(self, what: &str) -> Result<T> {
        self.map_err(|e| AniCacheError::StoreUnavailable(format!("{}: {}", what, e)))
    }
}

/// One row exactly as stored, before it is turned back into model types.
struct RawRecord {
    genome_a: String,
    genome_b: String,
    config_digest: String,
    orientation: String,
    ani: f64,
    af: f64,
    aligned_fragments: i64,
    total_fragments: i64,
    computed_at: i64,
    config_json: String,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawRecord {
            genome_a: row.get(0)?,
            genome_b: row.get(1)?,
            config_digest: row.get(2)?,
            orientation: row.get(3)?,
            ani: row.get(4)?,
            af: row.get(5)?,
            aligned_fragments: row.get(6)?,
            total_fragments: row.get(7)?,
            computed_at: row.get(8)?,
            config_json: row.get(9)?,
        })
    }

    fn into_entry(self) -> Result<(PairKey, CacheRecord)> {
        let corrupt = |what: &str| {
            AniCacheError::StoreUnavailable(format!(
                "corrupt record {}/{}: {}",
                self.genome_a, self.genome_b, what
            ))
        };
        let orientation = self.orientation.parse().map_err(|e: String| corrupt(&e))?;
        let computed_at = DateTime::from_timestamp_millis(self.computed_at)
            .ok_or_else(|| corrupt("timestamp out of range"))?;
        let config: ComparisonConfig =
            serde_json::from_str(&self.config_json).map_err(|e| corrupt(&e.to_string()))?;
        let aligned_fragments =
            u64::try_from(self.aligned_fragments).map_err(|_| corrupt("negative fragment count"))?;
        let total_fragments =
            u64::try_from(self.total_fragments).map_err(|_| corrupt("negative fragment count"))?;

        let key = PairKey {
            genome_a: GenomeDigest::new(self.genome_a),
            genome_b: GenomeDigest::new(self.genome_b),
            config_digest: self.config_digest,
            orientation,
        };
        let record = CacheRecord {
            ani: self.ani,
            aligned_fraction: self.af,
            aligned_fragments,
            total_fragments,
            computed_at,
            config,
        };
        Ok((key, record))
    }
}

fn to_sql_count(value: u64) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| AniCacheError::InvalidRecord(format!("fragment count {} is too large", value)))
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![name],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .or_unavailable("failed to inspect store tables")
}

fn meta_value(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
        row.get::<_, String>(0)
    })
    .optional()
    .or_unavailable("failed to read store metadata")
}

/// Refuse any store whose schema marker is missing or not ours.
fn enforce_schema_version(conn: &Connection) -> Result<u32> {
    let mismatch = |found: String| AniCacheError::SchemaVersionMismatch {
        expected: SCHEMA_VERSION,
        found,
    };
    if !table_exists(conn, "meta")? {
        return Err(mismatch("no schema marker".to_string()));
    }
    let value = meta_value(conn, META_KEY_SCHEMA_VERSION)?
        .ok_or_else(|| mismatch("no schema marker".to_string()))?;
    let parsed = value.parse::<u32>().map_err(|_| mismatch(value.clone()))?;
    if parsed != SCHEMA_VERSION {
        return Err(mismatch(value));
    }
    Ok(parsed)
}

fn write_record(
    tx: &Transaction<'_>,
    key: &PairKey,
    record: &CacheRecord,
    mode: WriteMode,
) -> Result<bool> {
    let config_json = serde_json::to_string(&record.config)
        .map_err(|e| AniCacheError::InvalidRecord(e.to_string()))?;
    let aligned_fragments = to_sql_count(record.aligned_fragments)?;
    let total_fragments = to_sql_count(record.total_fragments)?;
    let sql = match mode {
        WriteMode::Upsert => UPSERT_SQL,
        WriteMode::InsertIfAbsent => INSERT_IF_ABSENT_SQL,
    };
    let changed = tx
        .prepare_cached(sql)
        .and_then(|mut stmt| {
            stmt.execute(params![
                key.genome_a.as_str(),
                key.genome_b.as_str(),
                key.config_digest,
                key.orientation.as_str(),
                record.ani,
                record.aligned_fraction,
                aligned_fragments,
                total_fragments,
                record.computed_at.timestamp_millis(),
                config_json,
            ])
        })
        .or_unavailable("failed to write cache record")?;
    Ok(changed > 0)
}

///
/// Durable PairKey -> CacheRecord mapping.
///
/// A handle owns one SQLite connection behind a mutex, so it can be shared
/// between threads, but calls through one handle run one at a time.
/// Threads that need parallel reads should each open their own handle on
/// the same file: handles and processes coordinate through SQLite's locking,
/// and in WAL mode readers on separate handles never wait on each other or
/// on a writer.
///
pub struct CacheStore {
    conn: Mutex<Connection>,
    location: Option<PathBuf>,
    read_only: bool,
}

impl CacheStore {
    ///
    /// Open the store at `path`, creating the file and its tables when
    /// missing.
    ///
    /// # Errors
    ///
    /// - `StoreUnavailable` if the file can't be opened or is not a SQLite
    ///   database
    /// - `SchemaVersionMismatch` if the file holds tables from another
    ///   layout version (including stores without a schema marker)
    ///
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Connecting to ANI cache: {}", path.display());
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent).map_err(|e| {
                AniCacheError::StoreUnavailable(format!("can't create {}: {}", parent.display(), e))
            })?;
        }

        let mut conn = Connection::open(path).or_unavailable("failed to open store")?;
        conn.busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS))
            .or_unavailable("failed to set busy timeout")?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .or_unavailable("failed to enable WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .or_unavailable("failed to set synchronous mode")?;
        Self::initialize(&mut conn)?;

        let store = CacheStore {
            conn: Mutex::new(conn),
            location: Some(path.to_path_buf()),
            read_only: false,
        };
        log::info!(" - store contains {} entries", store.len()?);
        Ok(store)
    }

    ///
    /// Open an existing store without any write access. Used for merge
    /// inputs, which must never be modified.
    ///
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .or_unavailable(&format!("failed to open store {}", path.display()))?;
        conn.busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS))
            .or_unavailable("failed to set busy timeout")?;
        enforce_schema_version(&conn)?;

        Ok(CacheStore {
            conn: Mutex::new(conn),
            location: Some(path.to_path_buf()),
            read_only: true,
        })
    }

    /// A private store that lives as long as the handle.
    pub fn in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().or_unavailable("failed to open in-memory store")?;
        Self::initialize(&mut conn)?;
        Ok(CacheStore {
            conn: Mutex::new(conn),
            location: None,
            read_only: false,
        })
    }

    fn initialize(conn: &mut Connection) -> Result<()> {
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .or_unavailable("failed to start schema transaction")?;

        if table_exists(&tx, "meta")? {
            enforce_schema_version(&tx)?;
        } else if table_exists(&tx, "ani_cache")? || table_exists(&tx, "ani_table")? {
            return Err(AniCacheError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION,
                found: "no schema marker".to_string(),
            });
        } else {
            log::info!(" - creating ANI cache tables");
            tx.execute_batch(
                r#"
                CREATE TABLE meta (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );
                "#,
            )
            .or_unavailable("failed to create metadata table")?;
            tx.execute(
                "INSERT INTO meta (key, value) VALUES (?1, ?2)",
                params![META_KEY_SCHEMA_VERSION, SCHEMA_VERSION.to_string()],
            )
            .or_unavailable("failed to write schema marker")?;
            tx.execute(
                "INSERT INTO meta (key, value) VALUES (?1, ?2)",
                params![META_KEY_CREATED_BY, ANICACHE_VERSION],
            )
            .or_unavailable("failed to write schema marker")?;
        }

        tx.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS ani_cache (
                genome_a TEXT NOT NULL,
                genome_b TEXT NOT NULL,
                config_digest TEXT NOT NULL,
                orientation TEXT NOT NULL,
                ani REAL NOT NULL,
                af REAL NOT NULL,
                aligned_fragments INTEGER NOT NULL,
                total_fragments INTEGER NOT NULL,
                computed_at INTEGER NOT NULL,
                config_json TEXT NOT NULL,
                PRIMARY KEY (genome_a, genome_b, config_digest)
            );
            "#,
        )
        .or_unavailable("failed to create cache table")?;

        tx.commit().or_unavailable("failed to commit schema")
    }

    /// Path of the backing file, `None` for in-memory stores.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(AniCacheError::StoreUnavailable(
                "store was opened read-only".to_string(),
            ));
        }
        Ok(())
    }

    /// Look up one key.
    pub fn get(&self, key: &PairKey) -> Result<Option<CacheRecord>> {
        let conn = self.conn.lock();
        let raw = conn
            .prepare_cached(&format!(
                "SELECT {} FROM ani_cache WHERE genome_a = ?1 AND genome_b = ?2 AND config_digest = ?3",
                RECORD_COLUMNS
            ))
            .and_then(|mut stmt| {
                stmt.query_row(
                    params![key.genome_a.as_str(), key.genome_b.as_str(), key.config_digest],
                    RawRecord::from_row,
                )
                .optional()
            })
            .or_unavailable("failed to read cache record")?;

        match raw {
            Some(raw) => {
                let (stored_key, record) = raw.into_entry()?;
                Ok((stored_key == *key).then_some(record))
            }
            None => Ok(None),
        }
    }

    pub fn contains(&self, key: &PairKey) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    ///
    /// Look up many keys inside one read transaction, so the answer is a
    /// consistent snapshot even while other processes write.
    ///
    /// Every requested key appears in the result, mapped to `None` when
    /// absent.
    ///
    pub fn get_many(&self, keys: &[PairKey]) -> Result<BTreeMap<PairKey, Option<CacheRecord>>> {
        let mut found: BTreeMap<PairKey, Option<CacheRecord>> =
            keys.iter().map(|k| (k.clone(), None)).collect();
        if found.is_empty() {
            return Ok(found);
        }
        let unique: Vec<&PairKey> = found.keys().collect();
        let mut rows = Vec::new();

        {
            let mut conn = self.conn.lock();
            let tx = conn
                .transaction()
                .or_unavailable("failed to start read transaction")?;
            for chunk in unique.chunks(LOOKUP_CHUNK) {
                let placeholders = vec!["(?, ?, ?)"; chunk.len()].join(", ");
                let sql = format!(
                    "SELECT {} FROM ani_cache WHERE (genome_a, genome_b, config_digest) IN (VALUES {})",
                    RECORD_COLUMNS, placeholders
                );
                let values = chunk.iter().flat_map(|k| {
                    [
                        k.genome_a.as_str(),
                        k.genome_b.as_str(),
                        k.config_digest.as_str(),
                    ]
                });
                let mut stmt = tx.prepare(&sql).or_unavailable("failed to prepare lookup")?;
                let mapped = stmt
                    .query_map(params_from_iter(values), RawRecord::from_row)
                    .or_unavailable("failed to look up cache records")?;
                for raw in mapped {
                    rows.push(raw.or_unavailable("failed to read cache record")?);
                }
            }
            tx.commit().or_unavailable("failed to finish read transaction")?;
        }

        for raw in rows {
            let (key, record) = raw.into_entry()?;
            if let Some(slot) = found.get_mut(&key) {
                *slot = Some(record);
            }
        }
        Ok(found)
    }

    ///
    /// Write one record. Returns `true` when the supplied record is now the
    /// stored one, `false` when `InsertIfAbsent` kept an existing record.
    ///
    pub fn put(&self, key: &PairKey, record: &CacheRecord, mode: WriteMode) -> Result<bool> {
        let outcome = self.put_many(&[(key.clone(), record.clone())], mode)?;
        if let Some((_, err)) = outcome.rejected.into_iter().next() {
            return Err(err);
        }
        Ok(!outcome.written.is_empty())
    }

    ///
    /// Write a batch of records in one transaction.
    ///
    /// Invalid records are rejected up front and reported; the remaining
    /// ones commit together, so a concurrent reader sees either none or
    /// all of them. If the transaction itself fails nothing from this call
    /// is stored and previously committed records are untouched.
    ///
    pub fn put_many(&self, records: &[(PairKey, CacheRecord)], mode: WriteMode) -> Result<PutManyOutcome> {
        self.ensure_writable()?;
        let mut outcome = PutManyOutcome::default();

        let mut valid = Vec::with_capacity(records.len());
        for (key, record) in records {
            let checked = record
                .validate()
                .and_then(|_| to_sql_count(record.aligned_fragments))
                .and_then(|_| to_sql_count(record.total_fragments));
            match checked {
                Ok(_) => valid.push((key, record)),
                Err(e) => {
                    log::warn!("Refusing to cache {}: {}", key, e);
                    outcome.rejected.push((key.clone(), e));
                }
            }
        }
        if valid.is_empty() {
            return Ok(outcome);
        }

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .or_unavailable("failed to start write transaction")?;
        for (key, record) in valid {
            if write_record(&tx, key, record, mode)? {
                outcome.written.push(key.clone());
            } else {
                outcome.skipped.push(key.clone());
            }
        }
        tx.commit().or_unavailable("failed to commit cache records")?;

        log::debug!(
            "committed {} records ({} already present)",
            outcome.written.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    /// Every stored entry, in key order.
    pub fn records(&self) -> Result<Vec<(PairKey, CacheRecord)>> {
        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM ani_cache ORDER BY genome_a, genome_b, config_digest",
                    RECORD_COLUMNS
                ))
                .or_unavailable("failed to prepare scan")?;
            let mapped = stmt
                .query_map([], RawRecord::from_row)
                .or_unavailable("failed to scan cache records")?;
            mapped
                .collect::<rusqlite::Result<Vec<_>>>()
                .or_unavailable("failed to read cache record")?
        };
        let mut entries = rows
            .into_iter()
            .map(RawRecord::into_entry)
            .collect::<Result<Vec<_>>>()?;
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    /// Number of stored records.
    pub fn len(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM ani_cache", [], |row| row.get(0))
            .or_unavailable("failed to count cache records")?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn schema_version(&self) -> Result<u32> {
        let conn = self.conn.lock();
        enforce_schema_version(&conn)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let records = self.len()?;
        let conn = self.conn.lock();
        Ok(StoreStats {
            records,
            schema_version: enforce_schema_version(&conn)?,
            created_by: meta_value(&conn, META_KEY_CREATED_BY)?,
        })
    }
}
