use crate::error::ToolError;
use crate::query::{AssembledQuery, Cell, RawRow, SqlValue};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Column, Connection, Row, TypeInfo};
use tracing::{debug, error};

/// Executes assembled queries and hands back positional rows.
#[async_trait]
pub trait RowSource: Send + Sync {
    async fn fetch(&self, query: &AssembledQuery) -> Result<Vec<RawRow>, ToolError>;

    /// Cheap round-trip used by the health check.
    async fn ping(&self) -> Result<(), ToolError>;
}

/// Postgres source that opens one connection per call.
///
/// The connection lives for a single query and is closed (or dropped on
/// error) before the call returns; nothing is shared between tool calls.
pub struct PgRowSource {
    connection_string: String,
}

impl PgRowSource {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
        }
    }

    async fn connect(&self) -> Result<PgConnection, ToolError> {
        PgConnection::connect(&self.connection_string)
            .await
            .map_err(|e| {
                error!("Failed to connect to the database: {}", e);
                ToolError::from(e)
            })
    }
}

#[async_trait]
impl RowSource for PgRowSource {
    async fn fetch(&self, query: &AssembledQuery) -> Result<Vec<RawRow>, ToolError> {
        let mut connection = self.connect().await?;

        let mut statement = sqlx::query(&query.sql);
        for param in &query.params {
            statement = match param {
                SqlValue::Text(text) => statement.bind(text.as_str()),
                SqlValue::Int(value) => statement.bind(*value),
            };
        }

        let rows = statement.fetch_all(&mut connection).await.map_err(|e| {
            error!("Query failed: {}", e);
            ToolError::from(e)
        })?;
        debug!("Fetched {} rows", rows.len());

        let decoded = rows
            .iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()?;

        if let Err(e) = connection.close().await {
            debug!("Closing database connection failed: {}", e);
        }
        Ok(decoded)
    }

    async fn ping(&self) -> Result<(), ToolError> {
        let mut connection = self.connect().await?;
        sqlx::query("SELECT count(*) FROM team")
            .fetch_one(&mut connection)
            .await?;
        connection.close().await?;
        Ok(())
    }
}

fn decode_row(row: &PgRow) -> Result<RawRow, ToolError> {
    (0..row.columns().len())
        .map(|index| decode_cell(row, index))
        .collect::<Result<Vec<_>, _>>()
        .map(RawRow)
}

fn decode_cell(row: &PgRow, index: usize) -> Result<Cell, ToolError> {
    let type_name = row.column(index).type_info().name().to_string();
    let cell = match type_name.as_str() {
        "INT2" => row
            .try_get::<Option<i16>, _>(index)?
            .map(|v| Cell::Int(v.into())),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)?
            .map(|v| Cell::Int(v.into())),
        "INT8" => row.try_get::<Option<i64>, _>(index)?.map(Cell::Int),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)?
            .map(|v| Cell::Float(v.into())),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.map(Cell::Float),
        "DATE" => row.try_get::<Option<NaiveDate>, _>(index)?.map(Cell::Date),
        "TIME" => row.try_get::<Option<NaiveTime>, _>(index)?.map(Cell::Time),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
            row.try_get::<Option<String>, _>(index)?.map(Cell::Text)
        }
        other => {
            return Err(ToolError::UpstreamData(format!(
                "unsupported column type {} at position {}",
                other, index
            )))
        }
    };
    Ok(cell.unwrap_or(Cell::Null))
}
