use crate::config::Config;
use crate::error::{BronzeError, Result};
use crate::extract::SourceReader;
use crate::lineage::{stamp, LineageStamp, INGEST_DATE};
use crate::metrics::BronzeMetrics;
use crate::projection::{bronze_projections, EntityProjection};
use crate::store::{TableName, TableStore, WriteReceipt};
use crate::types::RowSet;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{error, info, instrument};

/// Result of a complete pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub batch_id: String,
    pub source_file: String,
    /// `catalog.namespace` the tables were written to.
    pub namespace: String,
    pub source_rows: usize,
    pub receipts: Vec<WriteReceipt>,
}

impl RunReport {
    /// `Bronze tables written: retail_demo.bronze.{products, sales, return_reasons}`
    pub fn confirmation(&self) -> String {
        let prefix = format!("{}.", self.namespace);
        let tables: Vec<&str> = self
            .receipts
            .iter()
            .map(|r| r.table.strip_prefix(&prefix).unwrap_or(&r.table))
            .collect();
        format!(
            "Bronze tables written: {}.{{{}}}",
            self.namespace,
            tables.join(", ")
        )
    }
}

/// Extract → stamp → project → replace, for all three bronze tables.
pub struct BronzePipeline {
    config: Config,
    reader: Arc<dyn SourceReader>,
    store: Arc<dyn TableStore>,
    projections: Vec<Box<dyn EntityProjection>>,
}

impl BronzePipeline {
    pub fn new(config: Config, reader: Arc<dyn SourceReader>, store: Arc<dyn TableStore>) -> Self {
        Self {
            config,
            reader,
            store,
            projections: bronze_projections(),
        }
    }

    pub fn table_name(&self, table: &str) -> TableName {
        TableName::new(&self.config.catalog, &self.config.namespace, table)
    }

    /// Qualified names of every table this pipeline writes.
    pub fn tables(&self) -> Vec<TableName> {
        self.projections
            .iter()
            .map(|p| self.table_name(p.table()))
            .collect()
    }

    /// Runs with the lineage stamp taken from the clock now.
    pub async fn run(&self) -> Result<RunReport> {
        self.run_with(LineageStamp::capture(&self.config.source_file))
            .await
    }

    /// Runs as if the batch started at `ingest_ts`.
    pub async fn run_at(&self, ingest_ts: DateTime<Utc>) -> Result<RunReport> {
        self.run_with(LineageStamp::at(ingest_ts, &self.config.source_file))
            .await
    }

    async fn run_with(&self, lineage: LineageStamp) -> Result<RunReport> {
        BronzeMetrics::run_started();
        let started = Instant::now();
        let result = self.execute(lineage).await;
        if result.is_err() {
            BronzeMetrics::run_failed();
        }
        BronzeMetrics::run_finished(started.elapsed().as_secs_f64());
        result
    }

    #[instrument(skip_all, fields(batch_id = %lineage.batch_id))]
    async fn execute(&self, lineage: LineageStamp) -> Result<RunReport> {
        info!("🚀 Starting bronze run from {}", lineage.source_file);

        // Step 1: Extract
        let raw = self.reader.read(&lineage.source_file).await?;
        let source_rows = raw.len();
        BronzeMetrics::source_rows(source_rows);

        // Step 2: Stamp lineage once for the whole run
        let stamped = stamp(raw, &lineage);

        // Step 3: Project every entity before any write so a schema mismatch
        // leaves all tables untouched
        let mut projected: Vec<(TableName, RowSet)> = Vec::with_capacity(self.projections.len());
        for projection in &self.projections {
            let rows = projection.project(&stamped)?;
            info!("🔧 Projected {} rows for {}", rows.len(), projection.table());
            projected.push((self.table_name(projection.table()), rows));
        }

        // Step 4: Replace each table independently
        let receipts = self.write_all(projected).await?;

        let report = RunReport {
            batch_id: lineage.batch_id.clone(),
            source_file: lineage.source_file.clone(),
            namespace: format!("{}.{}", self.config.catalog, self.config.namespace),
            source_rows,
            receipts,
        };
        info!("✅ {}", report.confirmation());
        Ok(report)
    }

    /// Writes run concurrently. A rejected write does not stop the others;
    /// the first failure is returned once every write has finished.
    async fn write_all(&self, projected: Vec<(TableName, RowSet)>) -> Result<Vec<WriteReceipt>> {
        let count = projected.len();
        let mut writes = JoinSet::new();
        for (slot, (table, rows)) in projected.into_iter().enumerate() {
            let store = Arc::clone(&self.store);
            writes.spawn(async move {
                let started = Instant::now();
                let result = store.replace(&table, &rows, INGEST_DATE).await;
                match &result {
                    Ok(receipt) => {
                        info!("💾 Replaced {} ({} rows, version {})", table, receipt.rows_written, receipt.version);
                        BronzeMetrics::table_written(
                            &table.table,
                            receipt.rows_written,
                            started.elapsed().as_secs_f64(),
                        );
                    }
                    Err(e) => {
                        error!("Replace of {} failed: {}", table, e);
                        BronzeMetrics::table_write_failed(&table.table);
                    }
                }
                (slot, result)
            });
        }

        let mut slots: Vec<Option<Result<WriteReceipt>>> = (0..count).map(|_| None).collect();
        let mut first_error: Option<BronzeError> = None;
        while let Some(joined) = writes.join_next().await {
            match joined {
                Ok((slot, result)) => slots[slot] = Some(result),
                Err(e) => {
                    error!("Table write task aborted: {}", e);
                    if first_error.is_none() {
                        first_error = Some(BronzeError::write_failed("table writer", e));
                    }
                }
            }
        }

        let mut receipts = Vec::with_capacity(count);
        for result in slots.into_iter().flatten() {
            match result {
                Ok(receipt) => receipts.push(receipt),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(receipts),
        }
    }
}
