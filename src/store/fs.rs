//! Local warehouse implementation of [`TableStore`].
//!
//! ```text
//! <root>/<catalog>/<namespace>/<table>/
//! ├── _current                        # name of the published snapshot
//! ├── v00000001/                      # retained older snapshot
//! └── v00000002/
//!     ├── _schema.json
//!     └── ingest_date=2025-01-02/part-00000.ndjson
//! ```
//!
//! A replace writes a complete new version directory, then publishes it by
//! renaming a temp file over `_current`.

use super::{partition_rows, TableName, TableSnapshot, TableStore, WriteReceipt};
use crate::error::{BronzeError, Result};
use crate::types::{parse_date, parse_timestamp, ColumnType, RowSet, Schema, Value};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CURRENT_POINTER: &str = "_current";
const SCHEMA_FILE: &str = "_schema.json";
const PART_FILE: &str = "part-00000.ndjson";

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotManifest {
    version: u64,
    table: String,
    partition_column: String,
    schema: Schema,
    row_count: usize,
    partitions: Vec<String>,
    committed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FsTableStore {
    root: PathBuf,
}

impl FsTableStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn table_dir(&self, table: &TableName) -> PathBuf {
        table_dir(&self.root, table)
    }
}

fn table_dir(root: &Path, table: &TableName) -> PathBuf {
    root.join(&table.catalog)
        .join(&table.namespace)
        .join(&table.table)
}

fn version_name(version: u64) -> String {
    format!("v{:08}", version)
}

fn read_current(dir: &Path) -> std::io::Result<Option<u64>> {
    match fs::read_to_string(dir.join(CURRENT_POINTER)) {
        Ok(s) => Ok(s
            .trim()
            .strip_prefix('v')
            .and_then(|n| n.parse().ok())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl TableStore for FsTableStore {
    async fn replace(
        &self,
        table: &TableName,
        rows: &RowSet,
        partition_column: &str,
    ) -> Result<WriteReceipt> {
        let root = self.root.clone();
        let table = table.clone();
        let rows = rows.clone();
        let partition_column = partition_column.to_string();
        tokio::task::spawn_blocking(move || replace_blocking(&root, &table, &rows, &partition_column))
            .await
            .map_err(|e| BronzeError::write_failed("table store", e))?
    }

    async fn scan(&self, table: &TableName) -> Result<Option<TableSnapshot>> {
        let dir = self.table_dir(table);
        tokio::task::spawn_blocking(move || scan_blocking(&dir))
            .await
            .map_err(|e| BronzeError::Io(std::io::Error::new(ErrorKind::Other, e)))?
    }
}

fn replace_blocking(
    root: &Path,
    table: &TableName,
    rows: &RowSet,
    partition_column: &str,
) -> Result<WriteReceipt> {
    let groups = partition_rows(table, rows, partition_column)?;
    let fail = |reason: String| BronzeError::write_failed(table, reason);

    let dir = table_dir(root, table);
    fs::create_dir_all(&dir).map_err(|e| fail(format!("create {}: {}", dir.display(), e)))?;
    let previous = read_current(&dir).map_err(|e| fail(format!("read current pointer: {}", e)))?;
    let (version, version_dir) = claim_version(&dir, previous)
        .map_err(|e| fail(format!("claim version under {}: {}", dir.display(), e)))?;

    let written = write_snapshot(&version_dir, table, rows, partition_column, &groups, version)
        .and_then(|manifest| publish(&dir, previous, version).map(|_| manifest));

    match written {
        Ok(manifest) => {
            info!(
                "📦 Published {} {} ({} rows, {} partitions)",
                table,
                version_name(version),
                manifest.row_count,
                manifest.partitions.len()
            );
            Ok(WriteReceipt {
                table: table.to_string(),
                version,
                rows_written: manifest.row_count,
                partitions: manifest.partitions,
            })
        }
        Err(e) => {
            if let Err(cleanup) = fs::remove_dir_all(&version_dir) {
                warn!("Failed to remove abandoned {}: {}", version_dir.display(), cleanup);
            }
            Err(fail(e.to_string()))
        }
    }
}

fn write_snapshot(
    version_dir: &Path,
    table: &TableName,
    rows: &RowSet,
    partition_column: &str,
    groups: &std::collections::BTreeMap<String, Vec<usize>>,
    version: u64,
) -> Result<SnapshotManifest> {
    for (partition, indices) in groups {
        let part_dir = version_dir.join(partition);
        fs::create_dir_all(&part_dir)?;
        let mut writer = BufWriter::new(File::create(part_dir.join(PART_FILE))?);
        for &i in indices {
            let encoded: Vec<serde_json::Value> = rows.rows()[i].iter().map(encode_value).collect();
            serde_json::to_writer(&mut writer, &encoded)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        debug!("Wrote {} rows to {}", indices.len(), part_dir.display());
    }

    let manifest = SnapshotManifest {
        version,
        table: table.to_string(),
        partition_column: partition_column.to_string(),
        schema: rows.schema().clone(),
        row_count: rows.len(),
        partitions: groups.keys().cloned().collect(),
        committed_at: Utc::now(),
    };
    fs::write(
        version_dir.join(SCHEMA_FILE),
        serde_json::to_vec_pretty(&manifest)?,
    )?;
    Ok(manifest)
}

/// Creates the first free version directory after `previous`. Directories
/// left behind by writers that died before publishing are skipped; they were
/// never visible through `_current`.
fn claim_version(dir: &Path, previous: Option<u64>) -> std::io::Result<(u64, PathBuf)> {
    let mut version = previous.map_or(1, |v| v + 1);
    loop {
        let version_dir = dir.join(version_name(version));
        match fs::create_dir(&version_dir) {
            Ok(()) => return Ok((version, version_dir)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!("Skipping unpublished {}", version_dir.display());
                version += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Swaps `_current` to `version` unless another writer published first.
fn publish(dir: &Path, previous: Option<u64>, version: u64) -> Result<()> {
    if read_current(dir)? != previous {
        return Err(BronzeError::Io(std::io::Error::new(
            ErrorKind::Other,
            "table was replaced concurrently",
        )));
    }
    let tmp = dir.join(format!("{}.{}.tmp", CURRENT_POINTER, version_name(version)));
    fs::write(&tmp, version_name(version))?;
    fs::rename(&tmp, dir.join(CURRENT_POINTER))?;
    Ok(())
}

fn scan_blocking(dir: &Path) -> Result<Option<TableSnapshot>> {
    let Some(version) = read_current(dir)? else {
        return Ok(None);
    };
    let version_dir = dir.join(version_name(version));
    let manifest: SnapshotManifest =
        serde_json::from_slice(&fs::read(version_dir.join(SCHEMA_FILE))?)?;

    let mut rows = Vec::with_capacity(manifest.row_count);
    for partition in &manifest.partitions {
        let file = File::open(version_dir.join(partition).join(PART_FILE))?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let encoded: Vec<serde_json::Value> = serde_json::from_str(&line)?;
            let row = encoded
                .into_iter()
                .zip(&manifest.schema.columns)
                .map(|(v, c)| decode_value(v, c.data_type))
                .collect();
            rows.push(row);
        }
    }

    Ok(Some(TableSnapshot {
        version,
        partition_column: manifest.partition_column,
        partitions: manifest.partitions,
        rows: RowSet::new(manifest.schema, rows),
    }))
}

fn encode_value(value: &Value) -> serde_json::Value {
    use serde_json::Value as J;
    match value {
        Value::Null => J::Null,
        Value::Bool(b) => J::Bool(*b),
        Value::Int(i) => J::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f).map_or(J::Null, J::Number),
        Value::Date(_) | Value::Timestamp(_) | Value::Str(_) => {
            value.cast_string().map_or(J::Null, J::String)
        }
    }
}

fn decode_value(value: serde_json::Value, data_type: ColumnType) -> Value {
    use serde_json::Value as J;
    let decoded = match (data_type, value) {
        (_, J::Null) => None,
        (ColumnType::Boolean, J::Bool(b)) => Some(Value::Bool(b)),
        (ColumnType::Integer, J::Number(n)) => n.as_i64().map(Value::Int),
        (ColumnType::Double, J::Number(n)) => n.as_f64().map(Value::Float),
        (ColumnType::Date, J::String(s)) => parse_date(&s).map(Value::Date),
        (ColumnType::Timestamp, J::String(s)) => parse_timestamp(&s).map(Value::Timestamp),
        (ColumnType::String, J::String(s)) => Some(Value::Str(s)),
        _ => None,
    };
    decoded.unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Column;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn sample(n: usize, day: u32) -> RowSet {
        let date = NaiveDate::from_ymd_opt(2025, 1, day).unwrap();
        RowSet::new(
            Schema::new(vec![
                Column::new("id", ColumnType::String),
                Column::new("price", ColumnType::Double),
                Column::new("qty", ColumnType::Integer),
                Column::new("returned", ColumnType::Boolean),
                Column::new("ts", ColumnType::Timestamp),
                Column::new("ingest_date", ColumnType::Date),
            ]),
            (0..n)
                .map(|i| {
                    vec![
                        Value::Str(format!("P{}", i)),
                        Value::Float(10.5),
                        if i % 2 == 0 { Value::Int(i as i64) } else { Value::Null },
                        Value::Bool(i % 2 == 1),
                        Value::Timestamp(date.and_hms_milli_opt(8, 30, 0, 250).unwrap()),
                        Value::Date(date),
                    ]
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_replace_then_scan_returns_same_rows() {
        let dir = tempdir().unwrap();
        let store = FsTableStore::new(dir.path());
        let table = TableName::new("retail_demo", "bronze", "products");

        let rows = sample(3, 2);
        let receipt = store.replace(&table, &rows, "ingest_date").await.unwrap();
        assert_eq!(receipt.version, 1);
        assert_eq!(receipt.rows_written, 3);
        assert_eq!(receipt.partitions, vec!["ingest_date=2025-01-02"]);

        let snapshot = store.scan(&table).await.unwrap().unwrap();
        assert_eq!(snapshot.rows, rows);
        assert!(store
            .table_dir(&table)
            .join("v00000001/ingest_date=2025-01-02/part-00000.ndjson")
            .exists());
    }

    #[tokio::test]
    async fn test_replace_publishes_new_version_and_schema() {
        let dir = tempdir().unwrap();
        let store = FsTableStore::new(dir.path());
        let table = TableName::new("retail_demo", "bronze", "sales");

        store.replace(&table, &sample(5, 2), "ingest_date").await.unwrap();
        let narrower = sample(2, 3).select(&["id", "ingest_date"]).unwrap();
        let receipt = store.replace(&table, &narrower, "ingest_date").await.unwrap();
        assert_eq!(receipt.version, 2);

        let snapshot = store.scan(&table).await.unwrap().unwrap();
        assert_eq!(snapshot.version, 2);
        assert_eq!(snapshot.rows, narrower);
        assert_eq!(snapshot.partitions, vec!["ingest_date=2025-01-03"]);
        // previous snapshot is retained but no longer visible
        assert!(store.table_dir(&table).join("v00000001").exists());
    }

    #[tokio::test]
    async fn test_scan_of_unwritten_table_is_none() {
        let dir = tempdir().unwrap();
        let store = FsTableStore::new(dir.path());
        let table = TableName::new("retail_demo", "bronze", "return_reasons");
        assert!(store.scan(&table).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unpublished_version_dir_is_skipped() {
        let dir = tempdir().unwrap();
        let store = FsTableStore::new(dir.path());
        let table = TableName::new("retail_demo", "bronze", "sales");
        store.replace(&table, &sample(2, 2), "ingest_date").await.unwrap();

        // a writer died after claiming v2 but before publishing it
        fs::create_dir_all(store.table_dir(&table).join("v00000002/ingest_date=2025-01-02")).unwrap();

        let rows = sample(4, 3);
        let receipt = store.replace(&table, &rows, "ingest_date").await.unwrap();
        assert_eq!(receipt.version, 3);

        let snapshot = store.scan(&table).await.unwrap().unwrap();
        assert_eq!(snapshot.version, 3);
        assert_eq!(snapshot.rows, rows);

        // and the table keeps accepting reruns
        let again = store.replace(&table, &sample(1, 4), "ingest_date").await.unwrap();
        assert_eq!(again.version, 4);
    }

    #[test]
    fn test_moved_pointer_is_a_write_conflict() {
        let dir = tempdir().unwrap();
        let table_dir = dir.path().join("t");
        fs::create_dir_all(&table_dir).unwrap();
        fs::write(table_dir.join(CURRENT_POINTER), version_name(2)).unwrap();

        assert!(publish(&table_dir, Some(1), 3).is_err());
        assert_eq!(read_current(&table_dir).unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_missing_partition_column_fails_without_side_effects() {
        let dir = tempdir().unwrap();
        let store = FsTableStore::new(dir.path());
        let table = TableName::new("retail_demo", "bronze", "products");
        let rows = sample(1, 2).select(&["id"]).unwrap();

        let err = store.replace(&table, &rows, "ingest_date").await.unwrap_err();
        assert!(matches!(err, BronzeError::WriteFailed { .. }));
        assert!(!store.table_dir(&table).exists());
    }

    #[test]
    fn test_null_partition_goes_to_default_partition() {
        let dir = tempdir().unwrap();
        let table = TableName::new("c", "n", "t");
        let rows = RowSet::new(
            Schema::new(vec![Column::new("ingest_date", ColumnType::Date)]),
            vec![vec![Value::Null]],
        );
        let receipt = replace_blocking(dir.path(), &table, &rows, "ingest_date").unwrap();
        assert_eq!(receipt.partitions, vec!["ingest_date=__HIVE_DEFAULT_PARTITION__"]);
    }
}
