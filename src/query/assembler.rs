use super::filter::{QueryFragment, SqlValue};

/// One projected column: the name rows are read back by, and its SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub expr: &'static str,
}

impl Column {
    pub const fn new(name: &'static str, expr: &'static str) -> Self {
        Self { name, expr }
    }
}

/// One sort key. Ascending unless `descending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub expr: &'static str,
    pub descending: bool,
}

impl OrderBy {
    pub const fn asc(expr: &'static str) -> Self {
        Self {
            expr,
            descending: false,
        }
    }

    pub const fn desc(expr: &'static str) -> Self {
        Self {
            expr,
            descending: true,
        }
    }

    fn to_sql(self) -> String {
        if self.descending {
            format!("{} DESC", self.expr)
        } else {
            self.expr.to_string()
        }
    }
}

/// Fixed part of a tool's query: projection, joins and ordering.
///
/// The SELECT list is generated from `columns`, so the positional layout of
/// every returned row always matches the projection the normalizer reads.
#[derive(Debug, Clone, Copy)]
pub struct BaseQuery {
    pub columns: &'static [Column],
    pub from: &'static str,
    /// Join conditions that hold for every search of this tool.
    pub joins: &'static [&'static str],
    /// Sort keys, outermost first.
    pub order_by: &'static [OrderBy],
}

/// Executable query text plus its bound parameters, in placeholder order.
#[derive(Debug, Clone)]
pub struct AssembledQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub projection: &'static [Column],
    pub order_by: &'static [OrderBy],
    pub fragments: Vec<QueryFragment>,
}

impl AssembledQuery {
    #[cfg(test)]
    pub fn column_names(&self) -> Vec<&'static str> {
        self.projection.iter().map(|column| column.name).collect()
    }
}

/// Join the fragments conjunctively onto the base query.
///
/// Fragment `n` (1-based) is bound to placeholder `$n`; no value is ever
/// formatted into the SQL text.
pub fn assemble(base: &BaseQuery, fragments: Vec<QueryFragment>) -> AssembledQuery {
    let select = base
        .columns
        .iter()
        .map(|column| {
            if column.expr == column.name {
                column.expr.to_string()
            } else {
                format!("{} AS {}", column.expr, column.name)
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut conditions: Vec<String> = base.joins.iter().map(|join| join.to_string()).collect();
    let mut params = Vec::with_capacity(fragments.len());
    for (index, fragment) in fragments.iter().enumerate() {
        conditions.push(fragment.condition(&format!("${}", index + 1)));
        params.push(fragment.value());
    }

    let mut sql = format!("SELECT {} FROM {}", select, base.from);
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    if !base.order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        let keys: Vec<String> = base.order_by.iter().map(|key| key.to_sql()).collect();
        sql.push_str(&keys.join(", "));
    }

    AssembledQuery {
        sql,
        params,
        projection: base.columns,
        order_by: base.order_by,
        fragments,
    }
}
