use super::assembler::Column;
use crate::error::ToolError;
use chrono::{NaiveDate, NaiveTime};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::fmt;

/// One decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl Cell {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Float(value) if value.fract() == 0.0 => Some(*value as i64),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Int(value) => Value::from(*value),
            Self::Float(value) => Value::from(*value),
            Self::Text(text) => Value::from(text.as_str()),
            Self::Date(date) => Value::from(date.to_string()),
            Self::Time(time) => Value::from(time.to_string()),
        }
    }
}

/// Absent values render as `None`, matching how the tools have always
/// displayed them.
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("None"),
            Self::Int(value) => write!(f, "{}", value),
            Self::Float(value) if value.fract() == 0.0 => write!(f, "{:.0}", value),
            Self::Float(value) => write!(f, "{}", value),
            Self::Text(text) => f.write_str(text),
            Self::Date(date) => write!(f, "{}", date),
            Self::Time(time) => write!(f, "{}", time),
        }
    }
}

/// Positional row as returned by the data store.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow(pub Vec<Cell>);

/// Named access into a [`RawRow`] through the query's projection.
pub struct RowView<'a> {
    projection: &'a [Column],
    row: &'a RawRow,
}

impl<'a> RowView<'a> {
    pub fn new(projection: &'a [Column], row: &'a RawRow) -> Result<Self, ToolError> {
        if row.0.len() != projection.len() {
            return Err(ToolError::UpstreamData(format!(
                "row has {} columns but the query projects {}",
                row.0.len(),
                projection.len()
            )));
        }
        Ok(Self { projection, row })
    }

    pub fn get(&self, name: &str) -> Result<&'a Cell, ToolError> {
        self.projection
            .iter()
            .position(|column| column.name == name)
            .map(|index| &self.row.0[index])
            .ok_or_else(|| ToolError::UpstreamData(format!("column {} is not projected", name)))
    }
}

/// Display record built once per row; field order is preserved on output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputRecord {
    fields: Vec<(&'static str, Value)>,
}

impl OutputRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((name, value.into()));
        self
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    #[cfg(test)]
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|(name, _)| *name).collect()
    }
}

impl Serialize for OutputRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Hand code lookup. Total: anything unrecognised is `Unknown`.
pub fn hand_description(code: Option<&str>) -> &'static str {
    match code.map(str::trim) {
        Some("L") => "Left",
        Some("R") => "Right",
        Some("B") => "Both",
        _ => "Unknown",
    }
}

/// League code lookup. Unrecognised codes pass through unchanged.
pub fn league_name(code: &str) -> String {
    match code {
        "A" => "American League".to_string(),
        "N" => "National League".to_string(),
        other => other.to_string(),
    }
}

/// `"{a}-{b}"`, with whole numbers printed without decimals.
pub fn compose_score(first: &Cell, second: &Cell) -> String {
    format!("{}-{}", first, second)
}

/// `first + " " + last` with no null guard.
pub fn compose_name(first: &Cell, last: &Cell) -> String {
    format!("{} {}", first, last)
}

pub fn normalize_rows<F>(
    projection: &[Column],
    rows: &[RawRow],
    mapper: F,
) -> Result<Vec<OutputRecord>, ToolError>
where
    F: Fn(&RowView<'_>) -> Result<OutputRecord, ToolError>,
{
    rows.iter()
        .map(|row| mapper(&RowView::new(projection, row)?))
        .collect()
}
