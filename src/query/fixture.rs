//! In-memory [`RowSource`] for tests.
//!
//! Rows are pre-joined maps keyed by the SQL expression a predicate reads
//! (`"team.team_name"`) and by projected column name. Filter fragments are
//! evaluated with the same semantics Postgres applies to their SQL, and the
//! matches are sorted by the query's `ORDER BY` keys.

use super::filter::Predicate;
use super::{AssembledQuery, Cell, ColumnExpr, OrderBy, RawRow, SqlValue};
use crate::database::RowSource;
use crate::error::ToolError;
use async_trait::async_trait;
use chrono::Datelike;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

pub type FixtureRow = HashMap<&'static str, Cell>;

pub fn row(cells: &[(&'static str, Cell)]) -> FixtureRow {
    cells.iter().cloned().collect()
}

pub fn text(value: &str) -> Cell {
    Cell::Text(value.to_string())
}

#[derive(Default)]
pub struct FixtureSource {
    rows: Vec<FixtureRow>,
    failure: Option<fn() -> ToolError>,
    /// SQL of every query received, in order.
    pub seen: Mutex<Vec<String>>,
}

impl FixtureSource {
    pub fn new(rows: Vec<FixtureRow>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// A source whose every call fails with the given error.
    pub fn failing(failure: fn() -> ToolError) -> Self {
        Self {
            failure: Some(failure),
            ..Self::default()
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl RowSource for FixtureSource {
    async fn fetch(&self, query: &AssembledQuery) -> Result<Vec<RawRow>, ToolError> {
        self.seen.lock().unwrap().push(query.sql.clone());
        if let Some(failure) = self.failure {
            return Err(failure());
        }
        let mut matching: Vec<&FixtureRow> = self
            .rows
            .iter()
            .filter(|row| {
                query
                    .fragments
                    .iter()
                    .all(|fragment| matches(row, fragment.predicate()))
            })
            .collect();
        matching.sort_by(|a, b| sort_order(a, b, query.order_by));

        Ok(matching
            .into_iter()
            .map(|row| {
                RawRow(
                    query
                        .projection
                        .iter()
                        .map(|column| row.get(column.name).cloned().unwrap_or(Cell::Null))
                        .collect(),
                )
            })
            .collect())
    }

    async fn ping(&self) -> Result<(), ToolError> {
        match self.failure {
            Some(failure) => Err(failure()),
            None => Ok(()),
        }
    }
}

fn eval(row: &FixtureRow, expr: &ColumnExpr) -> Cell {
    let get = |column: &str| row.get(column).cloned().unwrap_or(Cell::Null);
    match *expr {
        ColumnExpr::Column(column) => get(column),
        ColumnExpr::Concat(first, second) => match (get(first), get(second)) {
            (Cell::Null, _) | (_, Cell::Null) => Cell::Null,
            (a, b) => Cell::Text(format!("{} {}", a, b)),
        },
        ColumnExpr::YearOf(column) => match get(column) {
            Cell::Date(date) => Cell::Int(date.year().into()),
            _ => Cell::Null,
        },
    }
}

fn sort_order(a: &FixtureRow, b: &FixtureRow, keys: &[OrderBy]) -> Ordering {
    let get = |row: &FixtureRow, expr: &str| row.get(expr).cloned().unwrap_or(Cell::Null);
    keys.iter().fold(Ordering::Equal, |order, key| {
        order.then_with(|| {
            let ordering = compare(&get(a, key.expr), &get(b, key.expr));
            if key.descending {
                ordering.reverse()
            } else {
                ordering
            }
        })
    })
}

/// Postgres default ordering: NULL sorts above every value.
fn compare(a: &Cell, b: &Cell) -> Ordering {
    match (a, b) {
        (Cell::Null, Cell::Null) => Ordering::Equal,
        (Cell::Null, _) => Ordering::Greater,
        (_, Cell::Null) => Ordering::Less,
        (Cell::Int(x), Cell::Int(y)) => x.cmp(y),
        (Cell::Float(x), Cell::Float(y)) => x.total_cmp(y),
        (Cell::Text(x), Cell::Text(y)) => x.cmp(y),
        (Cell::Date(x), Cell::Date(y)) => x.cmp(y),
        (Cell::Time(x), Cell::Time(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn equals(cell: &Cell, value: &SqlValue) -> bool {
    match (cell, value) {
        (Cell::Int(a), SqlValue::Int(b)) => *a == i64::from(*b),
        (Cell::Text(a), SqlValue::Text(b)) => a == b,
        _ => false,
    }
}

fn matches(row: &FixtureRow, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Contains { exprs, needle } => exprs.iter().any(|expr| {
            eval(row, expr)
                .as_str()
                .is_some_and(|text| text.to_uppercase().contains(&needle.to_uppercase()))
        }),
        Predicate::Equals { expr, value } => equals(&eval(row, expr), value),
        Predicate::EqualsIgnoreCase { expr, value } => eval(row, expr)
            .as_str()
            .is_some_and(|text| text.to_uppercase() == value.to_uppercase()),
        Predicate::EqualsAny { exprs, value } => {
            exprs.iter().any(|expr| equals(&eval(row, expr), value))
        }
    }
}
