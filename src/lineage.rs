use crate::types::{Column, ColumnType, RowSet, Value};
use chrono::{DateTime, NaiveDate, Utc};

pub const INGEST_TS: &str = "ingest_ts";
pub const BATCH_ID: &str = "batch_id";
pub const SOURCE_FILE: &str = "source_file";
pub const INGEST_DATE: &str = "ingest_date";

/// Lineage columns in the order they are appended.
pub const LINEAGE_COLUMNS: [&str; 4] = [INGEST_TS, BATCH_ID, SOURCE_FILE, INGEST_DATE];

/// Provenance of one run. Captured once and shared by every row the run
/// produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineageStamp {
    pub ingest_ts: DateTime<Utc>,
    pub batch_id: String,
    pub source_file: String,
    pub ingest_date: NaiveDate,
}

impl LineageStamp {
    /// Samples the clock.
    pub fn capture(source_file: &str) -> Self {
        Self::at(Utc::now(), source_file)
    }

    pub fn at(ingest_ts: DateTime<Utc>, source_file: &str) -> Self {
        Self {
            ingest_ts,
            batch_id: ingest_ts.format("%Y%m%d%H%M%S").to_string(),
            source_file: source_file.to_string(),
            ingest_date: ingest_ts.date_naive(),
        }
    }

    fn value_of(&self, column: &str) -> Value {
        match column {
            INGEST_TS => Value::Timestamp(self.ingest_ts.naive_utc()),
            BATCH_ID => Value::Str(self.batch_id.clone()),
            SOURCE_FILE => Value::Str(self.source_file.clone()),
            INGEST_DATE => Value::Date(self.ingest_date),
            _ => Value::Null,
        }
    }
}

/// Appends the four lineage columns to every row.
pub fn stamp(rows: RowSet, lineage: &LineageStamp) -> RowSet {
    let columns = [
        Column::new(INGEST_TS, ColumnType::Timestamp),
        Column::new(BATCH_ID, ColumnType::String),
        Column::new(SOURCE_FILE, ColumnType::String),
        Column::new(INGEST_DATE, ColumnType::Date),
    ];
    columns.into_iter().fold(rows, |acc, column| {
        let value = lineage.value_of(&column.name);
        acc.with_column(column, |_, _| value.clone())
    })
}
