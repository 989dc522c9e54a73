use super::{with_lineage, EntityProjection};
use crate::error::Result;
use crate::types::RowSet;

pub const TABLE: &str = "return_reasons";

pub const RETURN_REASON: &str = "return_reason";

/// Distinct non-null return reasons, first occurrence wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReturnReasonsProjection;

impl EntityProjection for ReturnReasonsProjection {
    fn table(&self) -> &'static str {
        TABLE
    }

    fn project(&self, stamped: &RowSet) -> Result<RowSet> {
        stamped
            .select(&with_lineage(&[RETURN_REASON]))?
            .filter_not_null(RETURN_REASON)?
            .drop_duplicates(RETURN_REASON)
    }
}
