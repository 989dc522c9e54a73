use super::order_id::compute_order_id;
use super::EntityProjection;
use crate::error::Result;
use crate::lineage::LINEAGE_COLUMNS;
use crate::types::{parse_temporal, Column, ColumnType, RowSet, Value};
use chrono::{NaiveDateTime, NaiveTime};

pub const TABLE: &str = "sales";

pub const SALE_COLUMNS: [&str; 8] = [
    "product_id",
    "purchase_date",
    "current_price",
    "markdown_percentage",
    "customer_rating",
    "is_returned",
    "return_reason",
    "stock_quantity",
];

pub const PURCHASE_TS: &str = "purchase_ts";
pub const ORDER_ID: &str = "order_id";

/// Every source row becomes one sale. Adds `purchase_ts` and the synthetic
/// `order_id`; neither filters nor deduplicates.
#[derive(Debug, Clone, Copy, Default)]
pub struct SalesProjection;

impl EntityProjection for SalesProjection {
    fn table(&self) -> &'static str {
        TABLE
    }

    fn project(&self, stamped: &RowSet) -> Result<RowSet> {
        let output_order: Vec<&str> = SALE_COLUMNS
            .iter()
            .copied()
            .chain([PURCHASE_TS, ORDER_ID])
            .chain(LINEAGE_COLUMNS)
            .collect();

        let selected: Vec<&str> = SALE_COLUMNS.iter().copied().chain(LINEAGE_COLUMNS).collect();
        let sales = stamped.select(&selected)?;

        // `select` guarantees both columns exist from here on
        let purchase_idx = sales.schema().index_of("purchase_date");
        let sales = sales.with_column(Column::new(PURCHASE_TS, ColumnType::Timestamp), |_, row| {
            purchase_idx
                .and_then(|i| to_timestamp(&row[i]))
                .map_or(Value::Null, Value::Timestamp)
        });

        let product_idx = sales.schema().index_of("product_id");
        let ts_idx = sales.schema().index_of(PURCHASE_TS);
        let sales = sales.with_column(Column::new(ORDER_ID, ColumnType::String), |_, row| {
            let product_id = product_idx.and_then(|i| row[i].cast_string());
            let purchase_ts = ts_idx.and_then(|i| match row[i] {
                Value::Timestamp(ts) => Some(ts),
                _ => None,
            });
            Value::Str(compute_order_id(product_id.as_deref(), purchase_ts))
        });

        sales.select(&output_order)
    }
}

/// Lenient timestamp conversion; anything unparsable is null.
fn to_timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Timestamp(ts) => Some(*ts),
        Value::Date(d) => Some(d.and_time(NaiveTime::MIN)),
        Value::Str(s) => parse_temporal(s.trim()),
        _ => None,
    }
}
