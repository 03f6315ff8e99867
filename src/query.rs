//! Dynamic search queries for the lookup tools.
//!
//! A tool turns its optional criteria into
//! [`QueryFragment`](filter::QueryFragment)s with a
//! [`FilterBuilder`], the [`assemble`] step joins them onto the tool's
//! [`BaseQuery`], a [`RowSource`](crate::database::RowSource) executes the
//! result, and [`normalize_rows`] maps every row into an [`OutputRecord`].

pub mod assembler;
pub mod filter;
pub mod normalize;

#[cfg(test)]
pub mod fixture;

pub use assembler::{assemble, AssembledQuery, BaseQuery, Column, OrderBy};
pub use filter::{ColumnExpr, FilterBuilder, SqlValue};
pub use normalize::{
    compose_name, compose_score, hand_description, league_name, Cell, OutputRecord, RawRow,
    RowView,
};

use crate::database::RowSource;
use crate::error::ToolError;
use normalize::normalize_rows;
use tracing::{debug, info};

/// Execute an assembled query and normalize every returned row.
///
/// A successful query that matches nothing yields an empty vector.
pub async fn run_search<F>(
    source: &dyn RowSource,
    query: &AssembledQuery,
    mapper: F,
) -> Result<Vec<OutputRecord>, ToolError>
where
    F: Fn(&RowView<'_>) -> Result<OutputRecord, ToolError>,
{
    debug!(
        "Generated SQL for search ({} bound parameters): {}",
        query.params.len(),
        query.sql
    );
    let rows = source.fetch(query).await?;
    let records = normalize_rows(query.projection, &rows, mapper)?;
    info!("Search returned {} records", records.len());
    Ok(records)
}
