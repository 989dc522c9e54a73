//! Reads the raw delimited extract into an untyped-at-rest, typed-in-memory
//! [`RowSet`]. Column types are inferred from content; nothing is declared.

use crate::error::{BronzeError, Result};
use crate::types::{parse_date, parse_temporal, parse_timestamp, Column, ColumnType, RowSet, Schema, Value};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// Port for whatever reads the source extract.
#[async_trait]
pub trait SourceReader: Send + Sync {
    async fn read(&self, source_file: &str) -> Result<RowSet>;
}

/// Comma-delimited file with a mandatory header row.
#[derive(Debug, Clone, Default)]
pub struct CsvSourceReader;

impl CsvSourceReader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SourceReader for CsvSourceReader {
    #[instrument(skip(self))]
    async fn read(&self, source_file: &str) -> Result<RowSet> {
        let bytes = tokio::fs::read(source_file)
            .await
            .map_err(|e| BronzeError::source_unreadable(source_file, e))?;
        let rows = parse_delimited(source_file, &bytes)?;
        info!(
            "📄 Read {} rows x {} columns from {}",
            rows.len(),
            rows.schema().len(),
            source_file
        );
        Ok(rows)
    }
}

/// Parses delimited bytes, infers a schema over every row, and converts each
/// field to the inferred type. Empty fields are nulls; short rows are padded
/// with nulls and long rows are cut at the header width.
pub fn parse_delimited(source_file: &str, bytes: &[u8]) -> Result<RowSet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| BronzeError::source_unreadable(source_file, e))?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(BronzeError::source_unreadable(source_file, "missing header row"));
    }
    let mut unique = HashSet::new();
    if let Some(dup) = headers.iter().find(|h| !unique.insert(h.as_str())) {
        return Err(BronzeError::source_unreadable(
            source_file,
            format!("duplicate header '{}'", dup),
        ));
    }

    let width = headers.len();
    let mut raw: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| BronzeError::source_unreadable(source_file, e))?;
        let mut fields: Vec<String> = record.iter().take(width).map(str::to_string).collect();
        fields.resize(width, String::new());
        raw.push(fields);
    }

    let mut candidates = vec![TypeCandidate::new(); headers.len()];
    for record in &raw {
        for (idx, field) in record.iter().enumerate() {
            if !field.is_empty() {
                candidates[idx].update(field);
            }
        }
    }

    let columns: Vec<Column> = headers
        .iter()
        .zip(&candidates)
        .map(|(name, candidate)| Column::new(name.clone(), candidate.decide()))
        .collect();
    for column in &columns {
        debug!("Inferred {} as {}", column.name, column.data_type);
    }

    let rows = raw
        .iter()
        .map(|record| {
            record
                .iter()
                .zip(&columns)
                .map(|(field, column)| convert(field, column.data_type))
                .collect()
        })
        .collect();

    Ok(RowSet::new(Schema::new(columns), rows))
}

fn convert(field: &str, data_type: ColumnType) -> Value {
    if field.is_empty() {
        return Value::Null;
    }
    let converted = match data_type {
        ColumnType::Boolean => parse_bool(field).map(Value::Bool),
        ColumnType::Integer => field.parse().ok().map(Value::Int),
        ColumnType::Double => field.parse().ok().map(Value::Float),
        ColumnType::Date => parse_date(field).map(Value::Date),
        ColumnType::Timestamp => parse_temporal(field).map(Value::Timestamp),
        ColumnType::String => Some(Value::Str(field.to_string())),
    };
    converted.unwrap_or(Value::Null)
}

fn parse_bool(field: &str) -> Option<bool> {
    if field.eq_ignore_ascii_case("true") {
        Some(true)
    } else if field.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Tracks which types every non-empty field of a column still fits.
#[derive(Debug, Clone, Copy)]
struct TypeCandidate {
    seen: bool,
    boolean: bool,
    integer: bool,
    double: bool,
    date: bool,
    timestamp: bool,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            seen: false,
            boolean: true,
            integer: true,
            double: true,
            date: true,
            timestamp: true,
        }
    }

    fn update(&mut self, field: &str) {
        self.seen = true;
        self.boolean &= parse_bool(field).is_some();
        self.integer &= field.parse::<i64>().is_ok();
        self.double &= field.parse::<f64>().is_ok();
        let is_date = parse_date(field).is_some();
        self.date &= is_date;
        self.timestamp &= is_date || parse_timestamp(field).is_some();
    }

    fn decide(&self) -> ColumnType {
        if !self.seen {
            ColumnType::String
        } else if self.boolean {
            ColumnType::Boolean
        } else if self.integer {
            ColumnType::Integer
        } else if self.double {
            ColumnType::Double
        } else if self.date {
            ColumnType::Date
        } else if self.timestamp {
            ColumnType::Timestamp
        } else {
            ColumnType::String
        }
    }
}
