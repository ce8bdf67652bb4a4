//! Statement values of the SQL DSL (§4.6): `SELECT`, table expressions and
//! `WITH [RECURSIVE]` CTEs. Like [`super::expr::Expr`], every value renders
//! itself through `sql()`; there is no separate pretty-printer pass beyond
//! the final `sqlformat` cleanup in the emitter.

use super::expr::Expr;
use super::format::indent;

#[derive(Debug, Clone)]
pub enum TableExpr {
    Named(String),
    /// `AS t` aliasing, used for LATERAL function calls and subqueries.
    Aliased(Box<TableExpr>, String),
    Call(String, Vec<Expr>),
    Subquery(Box<SelectStmt>),
    /// `(VALUES (...), (...)) AS t(col1, col2)`
    Values(Vec<Vec<Expr>>, String, Vec<String>),
    Intersect(Box<SelectStmt>, Box<SelectStmt>),
}

impl TableExpr {
    pub fn named(name: impl Into<String>) -> Self {
        TableExpr::Named(name.into())
    }

    pub fn aliased(self, alias: impl Into<String>) -> Self {
        TableExpr::Aliased(Box::new(self), alias.into())
    }

    pub fn sql(&self) -> String {
        match self {
            TableExpr::Named(name) => name.clone(),
            TableExpr::Aliased(inner, alias) => format!("{} {alias}", inner.sql()),
            TableExpr::Call(name, args) => {
                let rendered: Vec<String> = args.iter().map(Expr::sql).collect();
                format!("{name}({})", rendered.join(", "))
            }
            TableExpr::Subquery(select) => format!("({})", select.sql()),
            TableExpr::Values(rows, alias, columns) => {
                let rendered_rows: Vec<String> = rows
                    .iter()
                    .map(|row| {
                        let cells: Vec<String> = row.iter().map(Expr::sql).collect();
                        format!("({})", cells.join(", "))
                    })
                    .collect();
                format!(
                    "(VALUES {}) AS {alias}({})",
                    rendered_rows.join(", "),
                    columns.join(", ")
                )
            }
            TableExpr::Intersect(left, right) => {
                format!("({} INTERSECT {})", left.sql(), right.sql())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum JoinKind {
    Inner,
    Left,
    /// Implicit comma-join against a LATERAL function call.
    CrossLateral,
}

#[derive(Debug, Clone)]
pub struct Join {
    pub kind: JoinKind,
    pub table: TableExpr,
    pub on: Option<Expr>,
}

#[derive(Debug, Clone, Default)]
pub struct SelectStmt {
    pub distinct: bool,
    pub columns: Vec<Expr>,
    pub from: Option<TableExpr>,
    pub joins: Vec<Join>,
    pub where_: Vec<Expr>,
    pub order_by: Vec<Expr>,
    pub limit: Option<Expr>,
}

impl SelectStmt {
    pub fn new() -> Self {
        SelectStmt::default()
    }

    pub fn select(mut self, columns: Vec<Expr>) -> Self {
        self.columns = columns;
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn from(mut self, table: TableExpr) -> Self {
        self.from = Some(table);
        self
    }

    pub fn join(mut self, kind: JoinKind, table: TableExpr, on: Option<Expr>) -> Self {
        self.joins.push(Join { kind, table, on });
        self
    }

    pub fn filter(mut self, predicate: Expr) -> Self {
        self.where_.push(predicate);
        self
    }

    pub fn limit(mut self, value: Expr) -> Self {
        self.limit = Some(value);
        self
    }

    pub fn sql(&self) -> String {
        let mut out = String::from("SELECT ");
        if self.distinct {
            out.push_str("DISTINCT ");
        }
        if self.columns.is_empty() {
            out.push('*');
        } else {
            let cols: Vec<String> = self.columns.iter().map(Expr::sql).collect();
            out.push_str(&cols.join(", "));
        }

        if let Some(from) = &self.from {
            out.push_str("\nFROM ");
            out.push_str(&from.sql());
        }

        for join in &self.joins {
            let keyword = match join.kind {
                JoinKind::Inner => "JOIN",
                JoinKind::Left => "LEFT JOIN",
                JoinKind::CrossLateral => "CROSS JOIN LATERAL",
            };
            out.push_str(&format!("\n{keyword} {}", join.table.sql()));
            if let Some(on) = &join.on {
                out.push_str(&format!(" ON {}", on.sql()));
            }
        }

        if !self.where_.is_empty() {
            out.push_str("\nWHERE ");
            out.push_str(&Expr::and(self.where_.clone()).sql());
        }

        if !self.order_by.is_empty() {
            let parts: Vec<String> = self.order_by.iter().map(Expr::sql).collect();
            out.push_str(&format!("\nORDER BY {}", parts.join(", ")));
        }

        if let Some(limit) = &self.limit {
            out.push_str(&format!("\nLIMIT {}", limit.sql()));
        }

        out
    }
}

#[derive(Debug, Clone)]
pub struct CteDef {
    pub name: String,
    pub columns: Vec<String>,
    pub body: SelectStmt,
}

#[derive(Debug, Clone, Default)]
pub struct WithStmt {
    pub recursive: bool,
    pub ctes: Vec<CteDef>,
    pub body: Option<SelectStmt>,
}

impl WithStmt {
    pub fn new() -> Self {
        WithStmt::default()
    }

    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    pub fn cte(mut self, name: impl Into<String>, columns: Vec<String>, body: SelectStmt) -> Self {
        self.ctes.push(CteDef {
            name: name.into(),
            columns,
            body,
        });
        self
    }

    pub fn body(mut self, body: SelectStmt) -> Self {
        self.body = Some(body);
        self
    }

    pub fn sql(&self) -> String {
        let keyword = if self.recursive { "WITH RECURSIVE" } else { "WITH" };
        let mut out = String::from(keyword);
        out.push(' ');

        let rendered: Vec<String> = self
            .ctes
            .iter()
            .map(|cte| {
                let cols = if cte.columns.is_empty() {
                    String::new()
                } else {
                    format!("({})", cte.columns.join(", "))
                };
                format!("{}{} AS (\n{}\n)", cte.name, cols, indent(&cte.body.sql(), 1))
            })
            .collect();
        out.push_str(&rendered.join(",\n"));

        if let Some(body) = &self.body {
            out.push('\n');
            out.push_str(&body.sql());
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_renders_from_and_where() {
        let select = SelectStmt::new()
            .select(vec![Expr::column("object_id")])
            .from(TableExpr::named("melange_tuples"))
            .filter(Expr::column("object_type").eq(Expr::text("doc")));
        let sql = select.sql();
        assert!(sql.contains("FROM melange_tuples"));
        assert!(sql.contains("WHERE object_type = 'doc'"));
    }

    #[test]
    fn with_recursive_renders_keyword() {
        let with = WithStmt::new().recursive().cte(
            "visited",
            vec!["object_id".into()],
            SelectStmt::new().select(vec![Expr::column("object_id")]),
        );
        assert!(with.sql().starts_with("WITH RECURSIVE visited"));
    }
}
