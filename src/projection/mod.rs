//! Entity projections: one denormalized, lineage-stamped row stream in,
//! one entity-shaped row stream out per bronze table.
//!
//! Projections are pure. They never look at the table store, so the
//! orchestrator is free to evaluate them in any order or concurrently.

pub mod order_id;
pub mod products;
pub mod return_reasons;
pub mod sales;

use crate::error::Result;
use crate::lineage::LINEAGE_COLUMNS;
use crate::types::RowSet;

pub use products::ProductsProjection;
pub use return_reasons::ReturnReasonsProjection;
pub use sales::SalesProjection;

/// Reshapes the stamped source rows into a single entity's table.
pub trait EntityProjection: Send + Sync {
    /// Unqualified target table name.
    fn table(&self) -> &'static str;

    fn project(&self, stamped: &RowSet) -> Result<RowSet>;
}

/// The three bronze projections in write order.
pub fn bronze_projections() -> Vec<Box<dyn EntityProjection>> {
    vec![
        Box::new(ProductsProjection),
        Box::new(SalesProjection),
        Box::new(ReturnReasonsProjection),
    ]
}

/// `attributes` followed by the lineage columns.
pub(crate) fn with_lineage(attributes: &[&'static str]) -> Vec<&'static str> {
    attributes
        .iter()
        .copied()
        .chain(LINEAGE_COLUMNS)
        .collect()
}
