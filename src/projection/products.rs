use super::{with_lineage, EntityProjection};
use crate::error::Result;
use crate::types::RowSet;

pub const TABLE: &str = "products";

pub const PRODUCT_COLUMNS: [&str; 7] = [
    "product_id",
    "category",
    "brand",
    "season",
    "size",
    "color",
    "original_price",
];

/// One row per `product_id`; the first occurrence in source order wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductsProjection;

impl EntityProjection for ProductsProjection {
    fn table(&self) -> &'static str {
        TABLE
    }

    fn project(&self, stamped: &RowSet) -> Result<RowSet> {
        stamped
            .select(&with_lineage(&PRODUCT_COLUMNS))?
            .drop_duplicates("product_id")
    }
}
