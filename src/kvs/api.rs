//! The storage interface consumed by the operator engine.
//!
//! `LocalKvs` talks to an in-process engine; `KvsClient` reaches the shards
//! over HTTP. Scans of a table that does not exist yield no rows.

use super::row::Row;
use super::store::Datastore;
use crate::error::{KvsError, KvsResult};

use std::future::Future;
use std::sync::Arc;

/// Forward-only sequence of rows in ascending key order.
pub type RowIter = Box<dyn Iterator<Item = Row> + Send>;

pub trait Kvs: Send + Sync {
    fn put(
        &self,
        table: &str,
        row: &str,
        column: &str,
        value: &[u8],
    ) -> impl Future<Output = KvsResult<u64>> + Send;

    fn put_row(&self, table: &str, row: &Row) -> impl Future<Output = KvsResult<()>> + Send;

    /// Appends `delimiter + value` to the cell, creating it if absent.
    fn append(
        &self,
        table: &str,
        row: &str,
        column: &str,
        value: &[u8],
        delimiter: &str,
    ) -> impl Future<Output = KvsResult<()>> + Send;

    fn get_row(&self, table: &str, row: &str) -> impl Future<Output = KvsResult<Option<Row>>> + Send;

    fn exists_row(&self, table: &str, row: &str) -> impl Future<Output = KvsResult<bool>> + Send;

    fn get(
        &self,
        table: &str,
        row: &str,
        column: &str,
    ) -> impl Future<Output = KvsResult<Option<Vec<u8>>>> + Send;

    fn scan(
        &self,
        table: &str,
        from: Option<&str>,
        to_exclusive: Option<&str>,
    ) -> impl Future<Output = KvsResult<RowIter>> + Send;

    fn count(&self, table: &str) -> impl Future<Output = KvsResult<usize>> + Send;

    fn rename(&self, old_name: &str, new_name: &str) -> impl Future<Output = KvsResult<()>> + Send;

    fn delete(&self, table: &str) -> impl Future<Output = KvsResult<()>> + Send;
}

/// In-process access to a shard's engine.
#[derive(Clone)]
pub struct LocalKvs {
    store: Arc<Datastore>,
}

impl LocalKvs {
    pub fn new(store: Arc<Datastore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<Datastore> {
        &self.store
    }
}

fn absent_as_none<T>(result: KvsResult<T>) -> KvsResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

impl Kvs for LocalKvs {
    async fn put(&self, table: &str, row: &str, column: &str, value: &[u8]) -> KvsResult<u64> {
        self.store.put(table, row, column, value)
    }

    async fn put_row(&self, table: &str, row: &Row) -> KvsResult<()> {
        self.store.put_row(table, row).map(|_| ())
    }

    async fn append(
        &self,
        table: &str,
        row: &str,
        column: &str,
        value: &[u8],
        delimiter: &str,
    ) -> KvsResult<()> {
        self.store
            .append(table, row, column, value, delimiter)
            .map(|_| ())
    }

    async fn get_row(&self, table: &str, row: &str) -> KvsResult<Option<Row>> {
        absent_as_none(self.store.get_row(table, row, None).map(|(r, _)| r))
    }

    async fn exists_row(&self, table: &str, row: &str) -> KvsResult<bool> {
        Ok(self.store.exists_row(table, row))
    }

    async fn get(&self, table: &str, row: &str, column: &str) -> KvsResult<Option<Vec<u8>>> {
        absent_as_none(self.store.get(table, row, column, None).map(|(v, _)| v))
    }

    async fn scan(
        &self,
        table: &str,
        from: Option<&str>,
        to_exclusive: Option<&str>,
    ) -> KvsResult<RowIter> {
        match self.store.scan(table, from, to_exclusive) {
            Ok(scan) => Ok(Box::new(scan)),
            Err(KvsError::TableNotFound(_)) => Ok(Box::new(std::iter::empty())),
            Err(e) => Err(e),
        }
    }

    async fn count(&self, table: &str) -> KvsResult<usize> {
        self.store.count(table)
    }

    async fn rename(&self, old_name: &str, new_name: &str) -> KvsResult<()> {
        self.store.rename(old_name, new_name)
    }

    async fn delete(&self, table: &str) -> KvsResult<()> {
        self.store.delete(table)
    }
}
