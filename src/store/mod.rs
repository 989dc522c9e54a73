//! Durable, partitioned table storage behind the [`TableStore`] port.
//!
//! A replace publishes a complete new snapshot of the table. Readers observe
//! either the previous snapshot or the new one, never a partial mix.

pub mod fs;
pub mod memory;

use crate::error::{BronzeError, Result};
use crate::types::{RowSet, Schema, Value};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub use fs::FsTableStore;
pub use memory::InMemoryTableStore;

/// Partition value used for null partition keys.
pub const DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// Fully qualified `catalog.namespace.table` name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    pub catalog: String,
    pub namespace: String,
    pub table: String,
}

impl TableName {
    pub fn new(catalog: &str, namespace: &str, table: &str) -> Self {
        Self {
            catalog: catalog.to_string(),
            namespace: namespace.to_string(),
            table: table.to_string(),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.catalog, self.namespace, self.table)
    }
}

/// Result of a successful replace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReceipt {
    pub table: String,
    pub version: u64,
    pub rows_written: usize,
    pub partitions: Vec<String>,
}

/// The currently published content of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSnapshot {
    pub version: u64,
    pub partition_column: String,
    pub partitions: Vec<String>,
    pub rows: RowSet,
}

#[async_trait]
pub trait TableStore: Send + Sync {
    /// Atomically replaces the whole table with `rows`, organized by
    /// `partition_column`. The new schema need not match the previous one.
    async fn replace(
        &self,
        table: &TableName,
        rows: &RowSet,
        partition_column: &str,
    ) -> Result<WriteReceipt>;

    /// Published snapshot, or `None` if the table was never written.
    async fn scan(&self, table: &TableName) -> Result<Option<TableSnapshot>>;
}

/// Partition directory name for a partition key value. Null and empty values
/// land in [`DEFAULT_PARTITION`]; path-significant characters are
/// percent-encoded so every value stays a single directory level.
pub fn partition_name(column: &str, value: &Value) -> String {
    let rendered = match value.cast_string() {
        Some(s) if !s.is_empty() => escape_path_name(&s),
        _ => DEFAULT_PARTITION.to_string(),
    };
    format!("{}={}", escape_path_name(column), rendered)
}

fn escape_path_name(name: &str) -> String {
    if name == "." || name == ".." {
        return name.replace('.', "%2E");
    }
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if needs_escape(c) {
            escaped.push_str(&format!("%{:02X}", c as u32));
        } else {
            escaped.push(c);
        }
    }
    escaped
}

// Same set the Hive metastore escapes in partition paths.
fn needs_escape(c: char) -> bool {
    c.is_ascii_control()
        || matches!(
            c,
            '"' | '#' | '%' | '\'' | '*' | '/' | ':' | '=' | '?' | '\\' | '{' | '[' | ']' | '^'
        )
}

/// Groups row indices by partition, preserving row order inside each group.
pub(crate) fn partition_rows(
    table: &TableName,
    rows: &RowSet,
    partition_column: &str,
) -> Result<BTreeMap<String, Vec<usize>>> {
    let idx = rows.schema().index_of(partition_column).ok_or_else(|| {
        BronzeError::write_failed(
            table,
            format!("partition column '{}' is not in the result set", partition_column),
        )
    })?;

    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, row) in rows.rows().iter().enumerate() {
        groups
            .entry(partition_name(partition_column, &row[idx]))
            .or_default()
            .push(i);
    }
    Ok(groups)
}

/// Rebuilds a row set in partition order.
pub(crate) fn gather(schema: &Schema, rows: &RowSet, groups: &BTreeMap<String, Vec<usize>>) -> RowSet {
    let ordered = groups
        .values()
        .flat_map(|indices| indices.iter().map(|&i| rows.rows()[i].clone()))
        .collect();
    RowSet::new(schema.clone(), ordered)
}
