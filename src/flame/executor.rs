//! Operator Executor
//!
//! Applies one bound operator to one partition of the input table.
//!
//! Every operator follows the same template: scan `[from_key, to_key_exclusive)`
//! in ascending key order, feed each row (or, for `MapPartitions`, the whole
//! partition) to the closure, and write the results to the output table.
//! A failed scan or write aborts the partition; a closure that returns nothing
//! or panics only skips its row.

use super::lambda::Operator;
use super::types::{COLUMN_NAME, Pair, hash, unique_row_key};
use crate::error::FlameResult;
use crate::kvs::{Kvs, Row};

use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// The table range one operator request covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTask {
    pub input_table: String,
    pub output_table: String,
    pub from_key: Option<String>,
    pub to_key_exclusive: Option<String>,
}

impl PartitionTask {
    pub fn new(input_table: impl Into<String>, output_table: impl Into<String>) -> Self {
        Self {
            input_table: input_table.into(),
            output_table: output_table.into(),
            from_key: None,
            to_key_exclusive: None,
        }
    }

    pub fn with_range(mut self, from_key: Option<&str>, to_key_exclusive: Option<&str>) -> Self {
        self.from_key = from_key.map(str::to_string);
        self.to_key_exclusive = to_key_exclusive.map(str::to_string);
        self
    }
}

pub struct OperatorExecutor<K: Kvs> {
    kvs: K,
}

/// Runs a user closure, turning a panic into "no result".
fn invoke<T>(what: &str, row: &str, f: impl FnOnce() -> Option<T>) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("{} closure panicked on row '{}'; skipping", what, row);
            None
        }
    }
}

/// The single-value column of `row`, if it has one.
fn element(row: &Row) -> Option<String> {
    let value = row.get(COLUMN_NAME);
    if value.is_none() {
        tracing::debug!("Row '{}' has no '{}' column; skipping", row.key(), COLUMN_NAME);
    }
    value
}

impl<K: Kvs> OperatorExecutor<K> {
    pub fn new(kvs: K) -> Self {
        Self { kvs }
    }

    pub fn kvs(&self) -> &K {
        &self.kvs
    }

    /// Runs `operator` over `task`. Only `Fold` produces a value.
    pub async fn run(&self, task: &PartitionTask, operator: &Operator) -> FlameResult<Option<String>> {
        tracing::debug!(
            "Running {:?} on {} [{:?}, {:?}) -> {}",
            operator,
            task.input_table,
            task.from_key,
            task.to_key_exclusive,
            task.output_table
        );

        let rows = self
            .kvs
            .scan(
                &task.input_table,
                task.from_key.as_deref(),
                task.to_key_exclusive.as_deref(),
            )
            .await?;

        let out = task.output_table.as_str();
        let mut i = 0usize;

        match operator {
            Operator::FlatMap(f) => {
                for row in rows {
                    let Some(value) = element(&row) else { continue };
                    let Some(results) = invoke("flatMap", row.key(), || (f.0)(&value)) else {
                        continue;
                    };
                    for result in results {
                        self.put(out, &unique_row_key(row.key(), i), COLUMN_NAME, &result)
                            .await?;
                        i += 1;
                    }
                }
            }

            Operator::MapToPair(f) => {
                for row in rows {
                    let Some(value) = element(&row) else { continue };
                    if let Some(pair) = invoke("mapToPair", row.key(), || (f.0)(&value)) {
                        self.put(out, &pair.key, row.key(), &pair.value).await?;
                    }
                }
            }

            Operator::FlatMapToPair(f) => {
                for row in rows {
                    let Some(value) = element(&row) else { continue };
                    let Some(pairs) = invoke("flatMapToPair", row.key(), || (f.0)(&value)) else {
                        continue;
                    };
                    for pair in pairs {
                        self.put(out, &pair.key, &unique_row_key(row.key(), i), &pair.value)
                            .await?;
                        i += 1;
                    }
                }
            }

            Operator::PairFlatMap(f) => {
                for row in rows {
                    for (_, value) in row.values() {
                        let pair = Pair::new(row.key(), value);
                        let Some(results) = invoke("pairFlatMap", row.key(), || (f.0)(&pair))
                        else {
                            continue;
                        };
                        for result in results {
                            self.put(out, &unique_row_key(row.key(), i), COLUMN_NAME, &result)
                                .await?;
                            i += 1;
                        }
                    }
                }
            }

            Operator::PairFlatMapToPair(f) => {
                for row in rows {
                    for (_, value) in row.values() {
                        let pair = Pair::new(row.key(), value);
                        let Some(results) =
                            invoke("pairFlatMapToPair", row.key(), || (f.0)(&pair))
                        else {
                            continue;
                        };
                        for result in results {
                            self.put(out, &result.key, &unique_row_key(row.key(), i), &result.value)
                                .await?;
                            i += 1;
                        }
                    }
                }
            }

            Operator::FoldByKey { op, zero } => {
                for row in rows {
                    let folded = invoke("foldByKey", row.key(), || {
                        row.values()
                            .try_fold(zero.clone(), |acc, (_, value)| (op.0)(&acc, &value))
                    });
                    if let Some(folded) = folded {
                        self.put(out, row.key(), COLUMN_NAME, &folded).await?;
                    }
                }
            }

            Operator::Fold { op, zero } => {
                let mut acc = Some(zero.clone());
                for row in rows {
                    let Some(current) = acc.take() else { break };
                    let Some(value) = element(&row) else {
                        acc = Some(current);
                        continue;
                    };
                    acc = invoke("fold", row.key(), || (op.0)(&current, &value));
                }
                return Ok(acc);
            }

            Operator::GroupBy(f) => {
                for row in rows {
                    let Some(value) = element(&row) else { continue };
                    if let Some(group) = invoke("groupBy", row.key(), || (f.0)(&value)) {
                        self.put(out, &group, row.key(), &value).await?;
                    }
                }
            }

            Operator::Sample(fraction) => {
                for row in rows {
                    let Some(value) = element(&row) else { continue };
                    if rand::random::<f64>() < *fraction {
                        self.put(out, row.key(), COLUMN_NAME, &value).await?;
                    }
                }
            }

            Operator::Intersection(other) => {
                let members: HashSet<String> = self
                    .kvs
                    .scan(
                        other,
                        task.from_key.as_deref(),
                        task.to_key_exclusive.as_deref(),
                    )
                    .await?
                    .filter_map(|r| r.get(COLUMN_NAME))
                    .collect();

                for row in rows {
                    let Some(value) = element(&row) else { continue };
                    if members.contains(&value) {
                        self.put(out, row.key(), COLUMN_NAME, &value).await?;
                    }
                }
            }

            Operator::Distinct => {
                let mut seen = HashSet::new();
                for row in rows {
                    let Some(value) = element(&row) else { continue };
                    if seen.insert(value.clone()) {
                        self.put(out, &value, COLUMN_NAME, &value).await?;
                    }
                }
            }

            Operator::FromTable(f) => {
                for row in rows {
                    if let Some(value) = invoke("fromTable", row.key(), || (f.0)(&row)) {
                        self.put(out, row.key(), COLUMN_NAME, &value).await?;
                    }
                }
            }

            Operator::Join(other) => {
                for row in rows {
                    let Some(matched) = self.kvs.get_row(other, row.key()).await? else {
                        continue;
                    };
                    for (column, value) in row.values() {
                        for (other_column, other_value) in matched.values() {
                            let joined_column = hash(&format!("{}!{}", column, other_column));
                            let joined = format!("{},{}", value, other_value);
                            self.put(out, row.key(), &joined_column, &joined).await?;
                        }
                    }
                }
            }

            Operator::Cogroup(other) => {
                for row in rows {
                    let mine: Vec<String> = row.values().map(|(_, v)| v).collect();
                    let theirs: Vec<String> = match self.kvs.get_row(other, row.key()).await? {
                        Some(matched) => matched.values().map(|(_, v)| v).collect(),
                        None => Vec::new(),
                    };
                    let grouped = format!("[{}],[{}]", mine.join(","), theirs.join(","));
                    self.put(out, row.key(), COLUMN_NAME, &grouped).await?;
                }
            }

            Operator::Filter(f) => {
                for row in rows {
                    let Some(value) = element(&row) else { continue };
                    let keep = invoke("filter", row.key(), || Some((f.0)(&value))).unwrap_or(false);
                    if keep {
                        self.put(out, row.key(), COLUMN_NAME, &value).await?;
                    }
                }
            }

            Operator::MapPartitions(f) => {
                let values: Vec<String> = rows.filter_map(|r| element(&r)).collect();
                let base = task.from_key.as_deref().unwrap_or("");
                let results: Vec<String> = invoke("mapPartitions", base, || {
                    Some((f.0)(Box::new(values.into_iter())).collect())
                })
                .unwrap_or_default();

                for result in results {
                    self.put(out, &unique_row_key(base, i), COLUMN_NAME, &result)
                        .await?;
                    i += 1;
                }
            }
        }

        Ok(None)
    }

    /// Empty keys cannot be stored, so such outputs are dropped instead of failing the partition.
    async fn put(&self, table: &str, row: &str, column: &str, value: &str) -> FlameResult<()> {
        if row.is_empty() || column.is_empty() {
            tracing::debug!("Dropping output with empty key or column for '{}'", table);
            return Ok(());
        }
        self.kvs.put(table, row, column, value.as_bytes()).await?;
        Ok(())
    }
}
