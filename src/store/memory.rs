use super::{gather, partition_rows, TableName, TableSnapshot, TableStore, WriteReceipt};
use crate::error::{BronzeError, Result};
use crate::types::RowSet;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// In-memory table store for development/testing
#[derive(Default, Clone)]
pub struct InMemoryTableStore {
    tables: Arc<Mutex<HashMap<TableName, TableSnapshot>>>,
    rejected: Arc<Mutex<HashSet<String>>>,
}

impl InMemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later replace of `table` (unqualified name) fail.
    pub fn reject_writes_to(&self, table: &str) {
        self.rejected
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(table.to_string());
    }

    pub fn table_count(&self) -> usize {
        self.tables.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl TableStore for InMemoryTableStore {
    async fn replace(
        &self,
        table: &TableName,
        rows: &RowSet,
        partition_column: &str,
    ) -> Result<WriteReceipt> {
        if self
            .rejected
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&table.table)
        {
            return Err(BronzeError::write_failed(table, "write rejected by store"));
        }

        let groups = partition_rows(table, rows, partition_column)?;
        let partitions: Vec<String> = groups.keys().cloned().collect();
        let ordered = gather(rows.schema(), rows, &groups);

        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let version = tables.get(table).map_or(1, |s| s.version + 1);
        tables.insert(
            table.clone(),
            TableSnapshot {
                version,
                partition_column: partition_column.to_string(),
                partitions: partitions.clone(),
                rows: ordered,
            },
        );

        debug!("Replaced {} with {} rows (version {})", table, rows.len(), version);
        Ok(WriteReceipt {
            table: table.to_string(),
            version,
            rows_written: rows.len(),
            partitions,
        })
    }

    async fn scan(&self, table: &TableName) -> Result<Option<TableSnapshot>> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tables.get(table).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Column, ColumnType, Schema, Value};

    fn rows(values: &[i64]) -> RowSet {
        RowSet::new(
            Schema::new(vec![
                Column::new("n", ColumnType::Integer),
                Column::new("day", ColumnType::String),
            ]),
            values
                .iter()
                .map(|&v| vec![Value::Int(v), Value::from("d1")])
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_replace_overwrites_previous_content() {
        let store = InMemoryTableStore::new();
        let table = TableName::new("c", "n", "t");

        let first = store.replace(&table, &rows(&[1, 2, 3]), "day").await.unwrap();
        let second = store.replace(&table, &rows(&[9]), "day").await.unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);

        let snapshot = store.scan(&table).await.unwrap().unwrap();
        assert_eq!(snapshot.rows.len(), 1);
        assert_eq!(snapshot.partitions, vec!["day=d1"]);
    }

    #[tokio::test]
    async fn test_rejected_table_keeps_old_content() {
        let store = InMemoryTableStore::new();
        let table = TableName::new("c", "n", "t");
        store.replace(&table, &rows(&[1]), "day").await.unwrap();

        store.reject_writes_to("t");
        let err = store.replace(&table, &rows(&[5, 6]), "day").await.unwrap_err();
        assert!(matches!(err, BronzeError::WriteFailed { .. }));
        assert_eq!(store.scan(&table).await.unwrap().unwrap().rows.len(), 1);
    }
}
