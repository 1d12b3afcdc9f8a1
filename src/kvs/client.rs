//! Thin HTTP client for the storage workers of a cluster.
//!
//! The worker list comes from the coordinator (`GET /workers`, body: count on
//! the first line, then `id,ip:port` per line). Workers are ordered by id and
//! each owns the keys from its id up to the next worker's id; keys below the
//! smallest id belong to the last worker.

use super::api::{Kvs, RowIter};
use super::protocol::VERSION_HEADER;
use super::row::{Row, decode_stream};
use crate::error::{KvsError, KvsResult};

use parking_lot::Mutex;
use reqwest::{StatusCode, Url};
use std::sync::Arc;
use std::time::Duration;

const COORDINATOR_WORKERS: &str = "workers";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const READ_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerEntry {
    pub id: String,
    pub address: String,
}

/// A contiguous slice of a key range served by one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSlice {
    pub worker: usize,
    pub from: Option<String>,
    pub to_exclusive: Option<String>,
}

pub struct KvsClient {
    coordinator: String,
    http_client: reqwest::Client,
    workers: Mutex<Option<Arc<Vec<WorkerEntry>>>>,
}

impl KvsClient {
    pub fn new(coordinator: &str) -> Self {
        Self::with_http_client(coordinator, reqwest::Client::new())
    }

    /// Shares an existing connection pool.
    pub fn with_http_client(coordinator: &str, http_client: reqwest::Client) -> Self {
        Self {
            coordinator: coordinator.trim_end_matches('/').to_string(),
            http_client,
            workers: Mutex::new(None),
        }
    }

    /// Uses a fixed worker list instead of asking the coordinator.
    pub fn with_workers(coordinator: &str, workers: Vec<WorkerEntry>) -> Self {
        let client = Self::new(coordinator);
        *client.workers.lock() = Some(Arc::new(sorted(workers)));
        client
    }

    pub fn coordinator(&self) -> &str {
        &self.coordinator
    }

    /// Drops the cached worker list; the next call downloads it again.
    pub fn refresh(&self) {
        *self.workers.lock() = None;
    }

    pub async fn workers(&self) -> KvsResult<Arc<Vec<WorkerEntry>>> {
        let cached = self.workers.lock().clone();
        if let Some(workers) = cached {
            return Ok(workers);
        }

        let url = format!("http://{}/{}", self.coordinator, COORDINATOR_WORKERS);
        let response = self
            .send_with_retry(self.http_client.get(&url), READ_ATTEMPTS)
            .await?;
        if !response.status().is_success() {
            return Err(KvsError::Transport(format!(
                "coordinator {} returned {}",
                self.coordinator,
                response.status()
            )));
        }
        let workers = Arc::new(sorted(parse_worker_list(&response.text().await?)?));
        if workers.is_empty() {
            return Err(KvsError::Transport(format!(
                "coordinator {} reports no storage workers",
                self.coordinator
            )));
        }

        tracing::debug!("Fetched {} storage workers from {}", workers.len(), self.coordinator);
        *self.workers.lock() = Some(workers.clone());
        Ok(workers)
    }

    async fn send_with_retry(
        &self,
        request: reqwest::RequestBuilder,
        attempts: usize,
    ) -> KvsResult<reqwest::Response> {
        let mut delay_ms = 150u64;

        for attempt in 0..attempts {
            let Some(current) = request.try_clone() else {
                return Ok(request.timeout(REQUEST_TIMEOUT).send().await?);
            };

            match current.timeout(REQUEST_TIMEOUT).send().await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt + 1 == attempts {
                        return Err(e.into());
                    }
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(KvsError::Transport("retry attempts exhausted".to_string()))
    }

    fn url(&self, worker: &WorkerEntry, segments: &[&str]) -> KvsResult<Url> {
        let mut url = Url::parse(&format!("http://{}/", worker.address))
            .map_err(|e| KvsError::Transport(format!("bad worker address {}: {}", worker.address, e)))?;
        url.path_segments_mut()
            .map_err(|_| KvsError::Transport(format!("bad worker address {}", worker.address)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn worker_for(&self, key: &str) -> KvsResult<WorkerEntry> {
        let workers = self.workers().await?;
        Ok(workers[worker_index(&workers, key)].clone())
    }

    async fn put_cell(
        &self,
        table: &str,
        row: &str,
        column: &str,
        value: &[u8],
        query: &[(&str, &str)],
    ) -> KvsResult<u64> {
        let worker = self.worker_for(row).await?;
        let mut url = self.url(&worker, &["data", table, row, column])?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }

        let response = self
            .http_client
            .put(url)
            .body(value.to_vec())
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, table, response.text().await.unwrap_or_default()));
        }

        Ok(version_of(&response))
    }

    /// Conditional write; `Ok(None)` when the precondition did not hold.
    pub async fn conditional_put(
        &self,
        table: &str,
        row: &str,
        column: &str,
        value: &[u8],
        if_column: &str,
        expected: &str,
    ) -> KvsResult<Option<u64>> {
        match self
            .put_cell(table, row, column, value, &[("ifcolumn", if_column), ("equals", expected)])
            .await
        {
            Ok(version) => Ok(Some(version)),
            Err(KvsError::PreconditionFailed) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Applies a table-level request on every worker.
    ///
    /// Fails with `TableNotFound` only if no worker knows the table.
    async fn on_all_workers(
        &self,
        table: &str,
        build: impl Fn(Url) -> reqwest::RequestBuilder,
        segments: &[&str],
    ) -> KvsResult<Vec<String>> {
        let workers = self.workers().await?;
        let mut bodies = Vec::new();

        for worker in workers.iter() {
            let response = build(self.url(worker, segments)?)
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await?;
            let status = response.status();
            let body = response.text().await?;
            match status {
                s if s.is_success() => bodies.push(body),
                StatusCode::NOT_FOUND => continue,
                s => return Err(status_error(s, table, body)),
            }
        }

        if bodies.is_empty() {
            return Err(KvsError::TableNotFound(table.to_string()));
        }
        Ok(bodies)
    }
}

impl Kvs for KvsClient {
    async fn put(&self, table: &str, row: &str, column: &str, value: &[u8]) -> KvsResult<u64> {
        self.put_cell(table, row, column, value, &[]).await
    }

    async fn put_row(&self, table: &str, row: &Row) -> KvsResult<()> {
        let worker = self.worker_for(row.key()).await?;
        let url = self.url(&worker, &["data", table, row.key()])?;
        let response = self
            .http_client
            .put(url)
            .body(row.to_bytes())
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, table, response.text().await.unwrap_or_default()));
        }
        Ok(())
    }

    async fn append(
        &self,
        table: &str,
        row: &str,
        column: &str,
        value: &[u8],
        delimiter: &str,
    ) -> KvsResult<()> {
        self.put_cell(table, row, column, value, &[("append", delimiter)])
            .await
            .map(|_| ())
    }

    async fn get_row(&self, table: &str, row: &str) -> KvsResult<Option<Row>> {
        let worker = self.worker_for(row).await?;
        let url = self.url(&worker, &["data", table, row])?;
        let response = self
            .send_with_retry(self.http_client.get(url), READ_ATTEMPTS)
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(Row::from_bytes(&response.bytes().await?)?)),
            s => Err(status_error(s, table, response.text().await.unwrap_or_default())),
        }
    }

    async fn exists_row(&self, table: &str, row: &str) -> KvsResult<bool> {
        Ok(self.get_row(table, row).await?.is_some())
    }

    async fn get(&self, table: &str, row: &str, column: &str) -> KvsResult<Option<Vec<u8>>> {
        let worker = self.worker_for(row).await?;
        let url = self.url(&worker, &["data", table, row, column])?;
        let response = self
            .send_with_retry(self.http_client.get(url), READ_ATTEMPTS)
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(response.bytes().await?.to_vec())),
            s => Err(status_error(s, table, response.text().await.unwrap_or_default())),
        }
    }

    /// Fetches every worker slice before returning. `RowIter` is synchronous, so
    /// transport and codec errors have to surface here, before an operator
    /// starts writing output for the partition.
    async fn scan(
        &self,
        table: &str,
        from: Option<&str>,
        to_exclusive: Option<&str>,
    ) -> KvsResult<RowIter> {
        let workers = self.workers().await?;
        let mut rows = Vec::new();

        for slice in plan_scan(&workers, from, to_exclusive) {
            let mut url = self.url(&workers[slice.worker], &["data", table])?;
            {
                let mut query = url.query_pairs_mut();
                if let Some(start) = &slice.from {
                    query.append_pair("startRow", start);
                }
                if let Some(end) = &slice.to_exclusive {
                    query.append_pair("endRowExclusive", end);
                }
            }

            let response = self
                .send_with_retry(self.http_client.get(url), READ_ATTEMPTS)
                .await?;
            match response.status() {
                StatusCode::NOT_FOUND => continue,
                s if s.is_success() => rows.extend(decode_stream(&response.bytes().await?)?),
                s => return Err(status_error(s, table, response.text().await.unwrap_or_default())),
            }
        }

        Ok(Box::new(rows.into_iter()))
    }

    async fn count(&self, table: &str) -> KvsResult<usize> {
        let bodies = self
            .on_all_workers(table, |url| self.http_client.get(url), &["count", table])
            .await?;
        bodies.iter().try_fold(0usize, |total, body| {
            body.trim()
                .parse::<usize>()
                .map(|n| total + n)
                .map_err(|e| KvsError::Transport(format!("bad count '{}': {}", body, e)))
        })
    }

    async fn rename(&self, old_name: &str, new_name: &str) -> KvsResult<()> {
        let body = new_name.to_string();
        self.on_all_workers(
            old_name,
            |url| self.http_client.put(url).body(body.clone()),
            &["rename", old_name],
        )
        .await
        .map(|_| ())
        .map_err(|e| match e {
            KvsError::TableExists(_) => KvsError::TableExists(new_name.to_string()),
            KvsError::BadRequest(_) => KvsError::InvalidTableName(new_name.to_string()),
            e => e,
        })
    }

    async fn delete(&self, table: &str) -> KvsResult<()> {
        self.on_all_workers(table, |url| self.http_client.put(url), &["delete", table])
            .await
            .map(|_| ())
    }
}

fn sorted(mut workers: Vec<WorkerEntry>) -> Vec<WorkerEntry> {
    workers.sort_by(|a, b| a.id.cmp(&b.id));
    workers
}

fn version_of(response: &reqwest::Response) -> u64 {
    response
        .headers()
        .get(VERSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

fn status_error(status: StatusCode, table: &str, body: String) -> KvsError {
    match status {
        StatusCode::NOT_FOUND => KvsError::TableNotFound(table.to_string()),
        StatusCode::PRECONDITION_FAILED => KvsError::PreconditionFailed,
        StatusCode::CONFLICT => KvsError::TableExists(table.to_string()),
        StatusCode::BAD_REQUEST => KvsError::BadRequest(body),
        s => KvsError::Transport(format!("worker returned {}: {}", s, body)),
    }
}

/// Parses the coordinator's worker listing.
pub fn parse_worker_list(body: &str) -> KvsResult<Vec<WorkerEntry>> {
    let mut lines = body.lines().map(str::trim).filter(|l| !l.is_empty());
    let declared: usize = lines
        .next()
        .ok_or_else(|| KvsError::Transport("empty worker list".to_string()))?
        .parse()
        .map_err(|e| KvsError::Transport(format!("bad worker count: {}", e)))?;

    let workers = lines
        .take(declared)
        .map(|line| {
            let (id, address) = line
                .split_once(',')
                .ok_or_else(|| KvsError::Transport(format!("bad worker entry '{}'", line)))?;
            Ok(WorkerEntry {
                id: id.to_string(),
                address: address.to_string(),
            })
        })
        .collect::<KvsResult<Vec<_>>>()?;

    if workers.len() != declared {
        return Err(KvsError::Transport(format!(
            "worker list declares {} entries but has {}",
            declared,
            workers.len()
        )));
    }
    Ok(workers)
}

/// Index of the worker owning `key` in an id-sorted, non-empty list.
pub fn worker_index(workers: &[WorkerEntry], key: &str) -> usize {
    match workers.iter().rposition(|w| w.id.as_str() <= key) {
        Some(idx) => idx,
        None => workers.len() - 1,
    }
}

/// Splits `[from, to_exclusive)` into per-worker slices in ascending key order.
pub fn plan_scan(
    workers: &[WorkerEntry],
    from: Option<&str>,
    to_exclusive: Option<&str>,
) -> Vec<RangeSlice> {
    if workers.is_empty() {
        return Vec::new();
    }

    let last = workers.len() - 1;
    // The last worker also owns everything below the first id.
    let mut owned: Vec<(usize, Option<&str>, Option<&str>)> =
        vec![(last, None, Some(workers[0].id.as_str()))];
    for (idx, worker) in workers.iter().enumerate() {
        let upper = workers.get(idx + 1).map(|w| w.id.as_str());
        owned.push((idx, Some(worker.id.as_str()), upper));
    }

    owned
        .into_iter()
        .filter_map(|(worker, lo, hi)| {
            let start = max_lower(lo, from);
            let end = min_upper(hi, to_exclusive);
            if let (Some(s), Some(e)) = (start, end) {
                if s >= e {
                    return None;
                }
            }
            Some(RangeSlice {
                worker,
                from: start.map(str::to_string),
                to_exclusive: end.map(str::to_string),
            })
        })
        .collect()
}

fn max_lower<'a>(a: Option<&'a str>, b: Option<&'a str>) -> Option<&'a str> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn min_upper<'a>(a: Option<&'a str>, b: Option<&'a str>) -> Option<&'a str> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
