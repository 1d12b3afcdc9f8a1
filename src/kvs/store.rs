//! Per-shard storage engine.
//!
//! Tables are ordered maps of row key → versioned row. Each row keeps its full
//! history as a list of immutable snapshots, so version `v` is simply the
//! `v`-th snapshot. Writers to one row are serialized by that row's write
//! lock; readers only clone an `Arc` out of the history and never wait on a
//! writer that is still building its snapshot.
//!
//! Tables named with the `pt-` prefix are backed by an append-only log of row
//! snapshots in the storage directory and are rebuilt from it on open.

use super::replication::{NoReplication, ReplicationHook, WriteEvent};
use super::row::{Row, RowDecoder, write_stream_record};
use crate::error::{KvsError, KvsResult};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, VecDeque};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Tables with this prefix survive restarts.
pub const PERSISTENT_PREFIX: &str = "pt-";
const TABLE_FILE_EXTENSION: &str = "table";
const SCAN_BATCH: usize = 64;

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Written(u64),
    PreconditionFailed,
}

/// A row with its retained version history.
struct VersionedRow {
    history: RwLock<Vec<Arc<Row>>>,
    write_lock: Mutex<()>,
}

impl VersionedRow {
    fn new() -> Self {
        Self {
            history: RwLock::new(Vec::new()),
            write_lock: Mutex::new(()),
        }
    }

    fn latest(&self) -> Option<Arc<Row>> {
        self.history.read().last().cloned()
    }

    fn at(&self, version: u64) -> Option<Arc<Row>> {
        if version == 0 {
            return None;
        }
        self.history.read().get((version - 1) as usize).cloned()
    }

    fn version(&self) -> u64 {
        self.history.read().len() as u64
    }

    /// Publishes a new snapshot; the caller must hold `write_lock`.
    fn publish(&self, snapshot: Arc<Row>) -> u64 {
        let mut history = self.history.write();
        history.push(snapshot);
        history.len() as u64
    }
}

struct TableLog {
    path: PathBuf,
    file: File,
}

struct Table {
    rows: RwLock<BTreeMap<String, Arc<VersionedRow>>>,
    log: Option<Mutex<TableLog>>,
}

impl Table {
    fn in_memory() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            log: None,
        }
    }

    fn persistent(path: PathBuf) -> KvsResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            rows: RwLock::new(BTreeMap::new()),
            log: Some(Mutex::new(TableLog { path, file })),
        })
    }

    fn row_entry(&self, key: &str) -> Arc<VersionedRow> {
        if let Some(entry) = self.rows.read().get(key) {
            return entry.clone();
        }
        self.rows
            .write()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(VersionedRow::new()))
            .clone()
    }

    fn existing_row(&self, key: &str) -> Option<Arc<VersionedRow>> {
        self.rows.read().get(key).cloned()
    }

    fn count(&self) -> usize {
        self.rows
            .read()
            .values()
            .filter(|entry| entry.version() > 0)
            .count()
    }

    /// Makes a snapshot durable before it becomes visible.
    fn persist(&self, snapshot: &Row) -> KvsResult<()> {
        if let Some(log) = &self.log {
            let mut record = Vec::new();
            write_stream_record(snapshot, &mut record);
            log.lock().file.write_all(&record)?;
        }
        Ok(())
    }

    /// Applies `mutate` to the latest state of `key` under the row write lock.
    ///
    /// `mutate` returns `None` to leave the row untouched.
    fn write_row<F>(&self, key: &str, mutate: F) -> KvsResult<Option<u64>>
    where
        F: FnOnce(Option<&Row>) -> Option<Row>,
    {
        let entry = self.row_entry(key);
        let _guard = entry.write_lock.lock();
        let current = entry.latest();

        let Some(next) = mutate(current.as_deref()) else {
            return Ok(None);
        };

        self.persist(&next)?;
        Ok(Some(entry.publish(Arc::new(next))))
    }
}

/// Storage engine for one shard.
pub struct Datastore {
    dir: PathBuf,
    tables: DashMap<String, Arc<Table>>,
    catalog: Mutex<()>,
    replication: Arc<dyn ReplicationHook>,
}

impl Datastore {
    /// Opens the store rooted at `dir`, replaying every persistent table log.
    pub fn open(dir: impl AsRef<Path>) -> KvsResult<Self> {
        Self::open_with_replication(dir, Arc::new(NoReplication))
    }

    pub fn open_with_replication(
        dir: impl AsRef<Path>,
        replication: Arc<dyn ReplicationHook>,
    ) -> KvsResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let store = Self {
            dir,
            tables: DashMap::new(),
            catalog: Mutex::new(()),
            replication,
        };

        for entry in fs::read_dir(&store.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(TABLE_FILE_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !name.starts_with(PERSISTENT_PREFIX) {
                continue;
            }
            let name = name.to_string();
            let table = store.replay(&path)?;
            tracing::info!("Loaded persistent table {} ({} rows)", name, table.count());
            store.tables.insert(name, Arc::new(table));
        }

        Ok(store)
    }

    fn replay(&self, path: &Path) -> KvsResult<Table> {
        let bytes = fs::read(path)?;
        let table = Table::persistent(path.to_path_buf())?;
        let mut decoder = RowDecoder::new(&bytes);

        loop {
            match decoder.next_row() {
                Ok(Some(snapshot)) => {
                    let entry = table.row_entry(snapshot.key());
                    entry.publish(Arc::new(snapshot));
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(
                        "Ignoring damaged tail of {} at byte {}: {}",
                        path.display(),
                        decoder.position(),
                        e
                    );
                    break;
                }
            }
        }

        Ok(table)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, TABLE_FILE_EXTENSION))
    }

    fn table(&self, name: &str) -> KvsResult<Arc<Table>> {
        self.tables
            .get(name)
            .map(|t| t.value().clone())
            .ok_or_else(|| KvsError::TableNotFound(name.to_string()))
    }

    fn table_or_create(&self, name: &str) -> KvsResult<Arc<Table>> {
        if let Some(table) = self.tables.get(name) {
            return Ok(table.value().clone());
        }
        if !is_valid_table_name(name) {
            return Err(KvsError::InvalidTableName(name.to_string()));
        }

        let _catalog = self.catalog.lock();
        if let Some(table) = self.tables.get(name) {
            return Ok(table.value().clone());
        }
        let table = if name.starts_with(PERSISTENT_PREFIX) {
            Table::persistent(self.table_path(name))?
        } else {
            Table::in_memory()
        };
        let table = Arc::new(table);
        self.tables.insert(name.to_string(), table.clone());
        tracing::debug!("Created table {}", name);
        Ok(table)
    }

    /// Writes one cell and returns the row's new version.
    pub fn put(&self, table: &str, row: &str, column: &str, value: &[u8]) -> KvsResult<u64> {
        check_cell(row, column)?;
        let version = self
            .table_or_create(table)?
            .write_row(row, |current| {
                let mut next = current.cloned().unwrap_or_else(|| Row::new(row));
                next.put(column, value.to_vec());
                Some(next)
            })?
            .ok_or_else(|| KvsError::Codec("write produced no snapshot".to_string()))?;

        self.replication.after_write(&WriteEvent::Put {
            table,
            row,
            version,
        });
        Ok(version)
    }

    /// Upserts every column of `row`, one version per column, and returns the final version.
    ///
    /// A row without columns leaves the table untouched and returns the current version.
    pub fn put_row(&self, table: &str, row: &Row) -> KvsResult<u64> {
        for column in row.columns() {
            check_cell(row.key(), column)?;
        }
        let handle = self.table_or_create(table)?;
        if row.column_count() == 0 {
            return Ok(handle
                .existing_row(row.key())
                .map(|e| e.version())
                .unwrap_or(0));
        }

        let entry = handle.row_entry(row.key());
        let _guard = entry.write_lock.lock();
        let mut state = entry
            .latest()
            .map(|r| (*r).clone())
            .unwrap_or_else(|| Row::new(row.key()));

        let mut version = entry.version();
        for column in row.columns() {
            if let Some(value) = row.get_bytes(column) {
                state.put(column, value.to_vec());
                handle.persist(&state)?;
                version = entry.publish(Arc::new(state.clone()));
            }
        }
        drop(_guard);

        self.replication.after_write(&WriteEvent::Put {
            table,
            row: row.key(),
            version,
        });
        Ok(version)
    }

    /// Writes `value` only if `if_column` currently equals `expected`.
    ///
    /// A missing row or column fails the precondition.
    pub fn conditional_put(
        &self,
        table: &str,
        row: &str,
        column: &str,
        value: &[u8],
        if_column: &str,
        expected: &[u8],
    ) -> KvsResult<PutOutcome> {
        check_cell(row, column)?;
        let Ok(handle) = self.table(table) else {
            return Ok(PutOutcome::PreconditionFailed);
        };
        if handle.existing_row(row).is_none() {
            return Ok(PutOutcome::PreconditionFailed);
        }

        let written = handle.write_row(row, |current| {
            let current = current?;
            if current.get_bytes(if_column) != Some(expected) {
                return None;
            }
            let mut next = current.clone();
            next.put(column, value.to_vec());
            Some(next)
        })?;

        match written {
            Some(version) => {
                self.replication.after_write(&WriteEvent::Put {
                    table,
                    row,
                    version,
                });
                Ok(PutOutcome::Written(version))
            }
            None => Ok(PutOutcome::PreconditionFailed),
        }
    }

    /// Appends `delimiter + value` to the cell, or creates it with `value`.
    pub fn append(
        &self,
        table: &str,
        row: &str,
        column: &str,
        value: &[u8],
        delimiter: &str,
    ) -> KvsResult<u64> {
        check_cell(row, column)?;
        let version = self
            .table_or_create(table)?
            .write_row(row, |current| {
                let mut next = current.cloned().unwrap_or_else(|| Row::new(row));
                let combined = match next.get_bytes(column) {
                    Some(existing) => {
                        let mut combined = existing.to_vec();
                        combined.extend_from_slice(delimiter.as_bytes());
                        combined.extend_from_slice(value);
                        combined
                    }
                    None => value.to_vec(),
                };
                next.put(column, combined);
                Some(next)
            })?
            .ok_or_else(|| KvsError::Codec("append produced no snapshot".to_string()))?;

        self.replication.after_write(&WriteEvent::Put {
            table,
            row,
            version,
        });
        Ok(version)
    }

    /// Returns the row at `version`, or the latest state, together with the version read.
    pub fn get_row(&self, table: &str, row: &str, version: Option<u64>) -> KvsResult<(Row, u64)> {
        let entry = self
            .table(table)?
            .existing_row(row)
            .ok_or_else(|| KvsError::RowNotFound {
                table: table.to_string(),
                row: row.to_string(),
            })?;

        match version {
            Some(v) => entry
                .at(v)
                .map(|snapshot| ((*snapshot).clone(), v))
                .ok_or_else(|| KvsError::VersionNotFound {
                    row: row.to_string(),
                    version: v,
                }),
            None => {
                let history = entry.history.read();
                history
                    .last()
                    .map(|snapshot| ((**snapshot).clone(), history.len() as u64))
                    .ok_or_else(|| KvsError::RowNotFound {
                        table: table.to_string(),
                        row: row.to_string(),
                    })
            }
        }
    }

    /// Returns one cell at `version` (or latest) with the version read.
    pub fn get(
        &self,
        table: &str,
        row: &str,
        column: &str,
        version: Option<u64>,
    ) -> KvsResult<(Vec<u8>, u64)> {
        let (snapshot, read_version) = self.get_row(table, row, version)?;
        snapshot
            .get_bytes(column)
            .map(|v| (v.to_vec(), read_version))
            .ok_or_else(|| KvsError::ColumnNotFound {
                row: row.to_string(),
                column: column.to_string(),
            })
    }

    pub fn exists_row(&self, table: &str, row: &str) -> bool {
        self.table(table)
            .ok()
            .and_then(|t| t.existing_row(row))
            .map(|e| e.version() > 0)
            .unwrap_or(false)
    }

    /// Number of rows, or `TableNotFound` (distinct from zero).
    pub fn count(&self, table: &str) -> KvsResult<usize> {
        Ok(self.table(table)?.count())
    }

    /// Lazy ascending scan over `[from, to_exclusive)`; `None` bounds are open.
    pub fn scan(&self, table: &str, from: Option<&str>, to_exclusive: Option<&str>) -> KvsResult<Scan> {
        let table = self.table(table)?;
        Ok(Scan {
            table,
            next_from: from
                .map(|f| Bound::Included(f.to_string()))
                .unwrap_or(Bound::Unbounded),
            end: to_exclusive
                .map(|t| Bound::Excluded(t.to_string()))
                .unwrap_or(Bound::Unbounded),
            buffer: VecDeque::new(),
            exhausted: false,
        })
    }

    /// Up to `limit` rows starting at `from`, plus the key following the page.
    pub fn page(&self, table: &str, from: Option<&str>, limit: usize) -> KvsResult<(Vec<Row>, Option<String>)> {
        let mut scan = self.scan(table, from, None)?;
        let rows: Vec<Row> = scan.by_ref().take(limit).collect();
        let next = scan.next().map(|r| r.key().to_string());
        Ok((rows, next))
    }

    /// All table names with their row counts, sorted by name.
    pub fn tables(&self) -> Vec<(String, usize)> {
        let mut tables: Vec<(String, usize)> = self
            .tables
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().count()))
            .collect();
        tables.sort();
        tables
    }

    pub fn rename(&self, old_name: &str, new_name: &str) -> KvsResult<()> {
        let _catalog = self.catalog.lock();

        if !self.tables.contains_key(old_name) {
            return Err(KvsError::TableNotFound(old_name.to_string()));
        }
        if !is_valid_table_name(new_name)
            || old_name.starts_with(PERSISTENT_PREFIX) != new_name.starts_with(PERSISTENT_PREFIX)
        {
            return Err(KvsError::InvalidTableName(new_name.to_string()));
        }
        if self.tables.contains_key(new_name) {
            return Err(KvsError::TableExists(new_name.to_string()));
        }

        let table = self.table(old_name)?;
        if let Some(log) = &table.log {
            let mut log = log.lock();
            let new_path = self.table_path(new_name);
            fs::rename(&log.path, &new_path)?;
            log.path = new_path;
        }
        self.tables.remove(old_name);
        self.tables.insert(new_name.to_string(), table);
        drop(_catalog);

        tracing::info!("Renamed table {} to {}", old_name, new_name);
        self.replication.after_write(&WriteEvent::Rename {
            from: old_name,
            to: new_name,
        });
        Ok(())
    }

    pub fn delete(&self, table: &str) -> KvsResult<()> {
        let _catalog = self.catalog.lock();

        let (_, removed) = self
            .tables
            .remove(table)
            .ok_or_else(|| KvsError::TableNotFound(table.to_string()))?;
        if let Some(log) = &removed.log {
            let log = log.lock();
            if let Err(e) = fs::remove_file(&log.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    return Err(e.into());
                }
            }
        }
        drop(_catalog);

        tracing::info!("Deleted table {}", table);
        self.replication.after_write(&WriteEvent::Delete { table });
        Ok(())
    }
}

/// Row keys and column names may be any non-empty string.
fn check_cell(row: &str, column: &str) -> KvsResult<()> {
    if row.is_empty() {
        return Err(KvsError::BadRequest("empty row key".to_string()));
    }
    if column.is_empty() {
        return Err(KvsError::BadRequest(format!("empty column name in row '{}'", row)));
    }
    Ok(())
}

/// Table names double as file names for persistent tables.
pub fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains("..")
        && !name
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_whitespace())
}

/// Forward-only cursor over a key range.
///
/// Rows are fetched in small batches under a short read lock; each row is the
/// latest committed snapshot at the moment its batch is fetched.
pub struct Scan {
    table: Arc<Table>,
    next_from: Bound<String>,
    end: Bound<String>,
    buffer: VecDeque<Row>,
    exhausted: bool,
}

impl Scan {
    fn fill(&mut self) {
        if range_is_empty(&self.next_from, &self.end) {
            self.exhausted = true;
            return;
        }

        let rows = self.table.rows.read();
        let mut last_key = None;
        let mut fetched = 0;
        for (key, entry) in rows.range::<String, _>((self.next_from.clone(), self.end.clone())) {
            fetched += 1;
            last_key = Some(key.clone());
            if let Some(snapshot) = entry.latest() {
                self.buffer.push_back((*snapshot).clone());
            }
            if fetched == SCAN_BATCH {
                break;
            }
        }
        drop(rows);

        match last_key {
            Some(key) if fetched == SCAN_BATCH => self.next_from = Bound::Excluded(key),
            _ => self.exhausted = true,
        }
    }
}

impl Iterator for Scan {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        while self.buffer.is_empty() && !self.exhausted {
            self.fill();
        }
        self.buffer.pop_front()
    }
}

fn range_is_empty(start: &Bound<String>, end: &Bound<String>) -> bool {
    match (start, end) {
        (Bound::Included(s), Bound::Excluded(e)) | (Bound::Excluded(s), Bound::Excluded(e)) => {
            s >= e
        }
        _ => false,
    }
}
