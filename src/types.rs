use crate::error::{BronzeError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Logical column types produced by schema inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Boolean,
    Integer,
    Double,
    Date,
    Timestamp,
    String,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Boolean => "boolean",
            ColumnType::Integer => "integer",
            ColumnType::Double => "double",
            ColumnType::Date => "date",
            ColumnType::Timestamp => "timestamp",
            ColumnType::String => "string",
        };
        f.write_str(name)
    }
}

/// A single typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Str(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Renders the value as `CAST(value AS STRING)` would; `None` for nulls.
    pub fn cast_string(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(format_double(*f)),
            Value::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Value::Timestamp(ts) => Some(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            Value::Str(s) => Some(s.clone()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// Renders a double the way the JVM does: plain decimal with at least one
/// fractional digit inside `[1e-3, 1e7)`, `1.0E7`-style notation outside it.
fn format_double(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let magnitude = f.abs();
    if magnitude == 0.0 || (1e-3..1e7).contains(&magnitude) {
        return if f.fract() == 0.0 { format!("{:.1}", f) } else { f.to_string() };
    }
    let scientific = format!("{:e}", f);
    match scientific.split_once('e') {
        Some((mantissa, exponent)) if mantissa.contains('.') => format!("{}E{}", mantissa, exponent),
        Some((mantissa, exponent)) => format!("{}.0E{}", mantissa, exponent),
        None => scientific,
    }
}

const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parses `yyyy-MM-dd`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Parses the timestamp shapes found in delimited extracts. Offsets are
/// normalized to UTC.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, format) {
            return Some(ts);
        }
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc())
}

/// Date or timestamp text as a timestamp; bare dates land on midnight.
pub fn parse_temporal(s: &str) -> Option<NaiveDateTime> {
    parse_timestamp(s).or_else(|| parse_date(s).map(|d| d.and_time(NaiveTime::MIN)))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.index_of(name).ok_or_else(|| BronzeError::SchemaMismatch {
            missing: vec![name.to_string()],
        })
    }
}

/// An in-memory result set: a schema plus rows stored in schema order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowSet {
    schema: Schema,
    rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == schema.len()));
        Self { schema, rows }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.schema.names()
    }

    /// Value of `column` in row `row`.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.schema.index_of(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, column: &str) -> Option<Vec<&Value>> {
        let idx = self.schema.index_of(column)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Projects onto `names`, in that order. Every missing column is reported.
    pub fn select(&self, names: &[&str]) -> Result<RowSet> {
        let missing: Vec<String> = names
            .iter()
            .filter(|n| self.schema.index_of(n).is_none())
            .map(|n| n.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(BronzeError::SchemaMismatch { missing });
        }

        let indices: Vec<usize> = names
            .iter()
            .filter_map(|n| self.schema.index_of(n))
            .collect();
        let schema = Schema::new(
            indices
                .iter()
                .map(|&i| self.schema.columns[i].clone())
                .collect(),
        );
        let rows = self
            .rows
            .iter()
            .map(|r| indices.iter().map(|&i| r[i].clone()).collect())
            .collect();
        Ok(RowSet::new(schema, rows))
    }

    /// Adds a column derived from each row. A column with the same name is
    /// replaced in place instead of duplicated.
    pub fn with_column<F>(mut self, column: Column, mut derive: F) -> RowSet
    where
        F: FnMut(&Schema, &[Value]) -> Value,
    {
        let values: Vec<Value> = self
            .rows
            .iter()
            .map(|r| derive(&self.schema, r))
            .collect();

        match self.schema.index_of(&column.name) {
            Some(idx) => {
                self.schema.columns[idx] = column;
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.schema.columns.push(column);
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        self
    }

    /// Keeps rows whose `column` is not null.
    pub fn filter_not_null(self, column: &str) -> Result<RowSet> {
        let idx = self.schema.require(column)?;
        let rows = self
            .rows
            .into_iter()
            .filter(|r| !r[idx].is_null())
            .collect();
        Ok(RowSet::new(self.schema, rows))
    }

    /// Keeps the first row seen for every distinct value of `key`. Nulls
    /// compare equal to each other.
    pub fn drop_duplicates(self, key: &str) -> Result<RowSet> {
        let idx = self.schema.require(key)?;
        let mut seen: HashSet<Option<String>> = HashSet::new();
        let rows = self
            .rows
            .into_iter()
            .filter(|r| seen.insert(r[idx].cast_string()))
            .collect();
        Ok(RowSet::new(self.schema, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RowSet {
        RowSet::new(
            Schema::new(vec![
                Column::new("id", ColumnType::String),
                Column::new("qty", ColumnType::Integer),
            ]),
            vec![
                vec!["a".into(), Value::Int(1)],
                vec!["b".into(), Value::Null],
                vec!["a".into(), Value::Int(3)],
                vec![Value::Null, Value::Int(4)],
                vec![Value::Null, Value::Int(5)],
            ],
        )
    }

    #[test]
    fn test_cast_string() {
        assert_eq!(Value::Null.cast_string(), None);
        assert_eq!(Value::Int(42).cast_string().as_deref(), Some("42"));
        assert_eq!(Value::Float(10.0).cast_string().as_deref(), Some("10.0"));
        assert_eq!(Value::Float(12.75).cast_string().as_deref(), Some("12.75"));
        assert_eq!(Value::Bool(true).cast_string().as_deref(), Some("true"));
        let ts = parse_timestamp("2024-01-05 10:00:00").unwrap();
        assert_eq!(
            Value::Timestamp(ts).cast_string().as_deref(),
            Some("2024-01-05 10:00:00")
        );
    }

    #[test]
    fn test_doubles_outside_plain_range_use_exponent_notation() {
        let render = |f: f64| Value::Float(f).cast_string().unwrap();
        assert_eq!(render(9_999_999.0), "9999999.0");
        assert_eq!(render(1e7), "1.0E7");
        assert_eq!(render(12_345_678.9), "1.23456789E7");
        assert_eq!(render(-2.5e21), "-2.5E21");
        assert_eq!(render(0.001), "0.001");
        assert_eq!(render(0.00015), "1.5E-4");
        assert_eq!(render(0.0), "0.0");
        assert_eq!(render(f64::INFINITY), "Infinity");
    }

    #[test]
    fn test_parse_temporal_shapes() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert_eq!(parse_temporal("2024-01-05 10:00:00"), Some(expected));
        assert_eq!(parse_temporal("2024-01-05T10:00:00"), Some(expected));
        assert_eq!(parse_temporal("2024-01-05T11:00:00+01:00"), Some(expected));
        assert_eq!(
            parse_temporal("2024-01-05"),
            Some(expected.date().and_time(NaiveTime::MIN))
        );
        assert_eq!(parse_temporal("05/01/2024"), None);
    }

    #[test]
    fn test_select_reports_all_missing_columns() {
        let err = sample().select(&["id", "color", "size"]).unwrap_err();
        match err {
            BronzeError::SchemaMismatch { missing } => assert_eq!(missing, vec!["color", "size"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_select_reorders() {
        let projected = sample().select(&["qty", "id"]).unwrap();
        assert_eq!(projected.column_names(), vec!["qty", "id"]);
        assert_eq!(projected.get(0, "id"), Some(&Value::from("a")));
    }

    #[test]
    fn test_with_column_appends_and_replaces() {
        let rows = sample().with_column(Column::new("flag", ColumnType::Boolean), |_, _| {
            Value::Bool(true)
        });
        assert_eq!(rows.column_names(), vec!["id", "qty", "flag"]);

        let rows = rows.with_column(Column::new("qty", ColumnType::String), |_, _| {
            Value::from("x")
        });
        assert_eq!(rows.column_names(), vec!["id", "qty", "flag"]);
        assert_eq!(rows.schema().column("qty").unwrap().data_type, ColumnType::String);
        assert_eq!(rows.get(4, "qty"), Some(&Value::from("x")));
    }

    #[test]
    fn test_drop_duplicates_keeps_first_seen() {
        let deduped = sample().drop_duplicates("id").unwrap();
        assert_eq!(deduped.len(), 3);
        assert_eq!(deduped.get(0, "qty"), Some(&Value::Int(1)));
        assert_eq!(deduped.get(2, "qty"), Some(&Value::Int(4)));
    }

    #[test]
    fn test_filter_not_null() {
        let filtered = sample().filter_not_null("qty").unwrap();
        assert_eq!(filtered.len(), 4);
        assert!(sample().filter_not_null("missing").is_err());
    }
}
