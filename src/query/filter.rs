use crate::error::ToolError;

/// A value bound through the driver, never spliced into SQL text.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Int(i32),
}

/// Column side of a predicate. Only static SQL ever appears here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnExpr {
    Column(&'static str),
    /// `a || ' ' || b`, e.g. first+last name or location+name.
    Concat(&'static str, &'static str),
    /// `date_part('year', column)`
    YearOf(&'static str),
}

impl ColumnExpr {
    pub fn to_sql(&self) -> String {
        match *self {
            Self::Column(column) => column.to_string(),
            Self::Concat(first, second) => format!("{} || ' ' || {}", first, second),
            Self::YearOf(column) => format!("date_part('year', {})", column),
        }
    }

    #[cfg(test)]
    pub fn columns(&self) -> Vec<&'static str> {
        match *self {
            Self::Column(column) | Self::YearOf(column) => vec![column],
            Self::Concat(first, second) => vec![first, second],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Case-insensitive substring match against any of the expressions.
    Contains {
        exprs: Vec<ColumnExpr>,
        needle: String,
    },
    Equals {
        expr: ColumnExpr,
        value: SqlValue,
    },
    EqualsIgnoreCase {
        expr: ColumnExpr,
        value: String,
    },
    /// Exact match against any of the expressions.
    EqualsAny {
        exprs: Vec<ColumnExpr>,
        value: SqlValue,
    },
}

/// One standalone boolean condition carrying exactly one bound value.
///
/// Every fragment renders parenthesised when it has alternatives, so any
/// set of fragments can be joined with `AND` in any order.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFragment {
    predicate: Predicate,
}

impl QueryFragment {
    pub fn new(predicate: Predicate) -> Self {
        Self { predicate }
    }

    #[cfg(test)]
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Condition text with every reference to the value written as `placeholder`.
    pub fn condition(&self, placeholder: &str) -> String {
        match &self.predicate {
            Predicate::Contains { exprs, .. } => any_of(exprs.iter().map(|expr| {
                format!("upper({}) LIKE upper({})", expr.to_sql(), placeholder)
            })),
            Predicate::Equals { expr, .. } => format!("{} = {}", expr.to_sql(), placeholder),
            Predicate::EqualsIgnoreCase { expr, .. } => {
                format!("upper({}) = upper({})", expr.to_sql(), placeholder)
            }
            Predicate::EqualsAny { exprs, .. } => any_of(
                exprs
                    .iter()
                    .map(|expr| format!("{} = {}", expr.to_sql(), placeholder)),
            ),
        }
    }

    /// The value bound for this fragment's placeholder.
    pub fn value(&self) -> SqlValue {
        match &self.predicate {
            Predicate::Contains { needle, .. } => SqlValue::Text(format!("%{}%", needle)),
            Predicate::Equals { value, .. } | Predicate::EqualsAny { value, .. } => value.clone(),
            Predicate::EqualsIgnoreCase { value, .. } => SqlValue::Text(value.clone()),
        }
    }

    /// Every column this fragment reads.
    #[cfg(test)]
    pub fn columns(&self) -> Vec<&'static str> {
        let exprs: Vec<ColumnExpr> = match &self.predicate {
            Predicate::Contains { exprs, .. } | Predicate::EqualsAny { exprs, .. } => exprs.clone(),
            Predicate::Equals { expr, .. } | Predicate::EqualsIgnoreCase { expr, .. } => {
                vec![*expr]
            }
        };
        let mut columns: Vec<&'static str> = Vec::new();
        for column in exprs.iter().flat_map(ColumnExpr::columns) {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
        columns
    }
}

fn any_of(alternatives: impl Iterator<Item = String>) -> String {
    let alternatives: Vec<String> = alternatives.collect();
    if alternatives.len() == 1 {
        alternatives.into_iter().collect()
    } else {
        format!("({})", alternatives.join(" OR "))
    }
}

/// Present, non-blank text criterion.
fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Collects one fragment per supplied criterion, skipping absent ones.
#[derive(Debug, Default)]
pub struct FilterBuilder {
    fragments: Vec<QueryFragment>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(self, exprs: &[ColumnExpr], value: Option<&str>) -> Self {
        match present(value) {
            Some(needle) => self.push(Predicate::Contains {
                exprs: exprs.to_vec(),
                needle: needle.to_string(),
            }),
            None => self,
        }
    }

    pub fn equals_int(self, expr: ColumnExpr, value: Option<i32>) -> Self {
        match value {
            Some(value) => self.push(Predicate::Equals {
                expr,
                value: SqlValue::Int(value),
            }),
            None => self,
        }
    }

    pub fn equals_ignore_case(self, expr: ColumnExpr, value: Option<&str>) -> Self {
        match present(value) {
            Some(value) => self.push(Predicate::EqualsIgnoreCase {
                expr,
                value: value.to_string(),
            }),
            None => self,
        }
    }

    /// Match a stored single-letter code against the first letter of the input,
    /// so both `"A"` and `"American League"` select code `A`.
    pub fn first_letter(self, expr: ColumnExpr, value: Option<&str>) -> Self {
        let code = present(value).and_then(|value| value.chars().next());
        match code {
            Some(code) => self.push(Predicate::EqualsIgnoreCase {
                expr,
                value: code.to_string(),
            }),
            None => self,
        }
    }

    pub fn equals_any(self, exprs: &[ColumnExpr], value: Option<&str>) -> Self {
        match present(value) {
            Some(value) => self.push(Predicate::EqualsAny {
                exprs: exprs.to_vec(),
                value: SqlValue::Text(value.to_string()),
            }),
            None => self,
        }
    }

    fn push(mut self, predicate: Predicate) -> Self {
        self.fragments.push(QueryFragment::new(predicate));
        self
    }

    /// An empty filter set is rejected; it must never widen to "match everything".
    pub fn build(self) -> Result<Vec<QueryFragment>, ToolError> {
        if self.fragments.is_empty() {
            return Err(ToolError::invalid(
                "No search parameter specified! At least one search parameter must be provided.",
            ));
        }
        Ok(self.fragments)
    }
}
