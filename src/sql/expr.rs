//! Expression values of the SQL DSL (§4.6). Each variant renders itself
//! through [`Expr::sql`] — there is no dialect modeling and no
//! round-tripping back from text.

use crate::utils::sanitize_ident;

#[derive(Debug, Clone)]
pub enum Expr {
    Param(String),
    Column(String),
    /// `table.column`, pre-qualified.
    Qualified(String, String),
    LitText(String),
    LitInt(i64),
    LitBool(bool),
    Null,
    /// `ARRAY[]::type[]`
    EmptyTypedArray(String),
    Array(Vec<Expr>),
    /// `(e1, e2, ...)` — the right-hand operand of `IN`/`NOT IN`, as
    /// opposed to [`Expr::Array`] which renders a Postgres array literal.
    List(Vec<Expr>),
    /// Escape hatch for fragments the DSL doesn't model directly.
    Raw(String),
    Call(String, Vec<Expr>),
    Alias(Box<Expr>, String),

    Eq(Box<Expr>, Box<Expr>),
    NotEq(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Lte(Box<Expr>, Box<Expr>),
    Gt(Box<Expr>, Box<Expr>),
    Gte(Box<Expr>, Box<Expr>),

    In(Box<Expr>, Box<Expr>),
    NotIn(Box<Expr>, Box<Expr>),

    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),

    IsNull(Box<Expr>),
    IsNotNull(Box<Expr>),

    Exists(Box<super::stmt::SelectStmt>),
    NotExists(Box<super::stmt::SelectStmt>),

    Case(Vec<(Expr, Expr)>, Option<Box<Expr>>),
}

impl Expr {
    pub fn param(name: impl Into<String>) -> Self {
        Expr::Param(name.into())
    }

    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Expr::Qualified(table.into(), column.into())
    }

    pub fn text(value: impl Into<String>) -> Self {
        Expr::LitText(value.into())
    }

    /// A string set for `IN`/`NOT IN`, built from plain Rust strings.
    pub fn text_list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Expr::List(values.into_iter().map(|v| Expr::text(v.into())).collect())
    }

    pub fn is_in(self, set: Expr) -> Self {
        Expr::In(Box::new(self), Box::new(set))
    }

    pub fn not_in(self, set: Expr) -> Self {
        Expr::NotIn(Box::new(self), Box::new(set))
    }

    pub fn raw(fragment: impl Into<String>) -> Self {
        Expr::Raw(fragment.into())
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call(name.into(), args)
    }

    pub fn alias(self, name: impl Into<String>) -> Self {
        Expr::Alias(Box::new(self), name.into())
    }

    pub fn eq(self, other: Expr) -> Self {
        Expr::Eq(Box::new(self), Box::new(other))
    }

    pub fn and(parts: Vec<Expr>) -> Self {
        Expr::And(parts)
    }

    pub fn or(parts: Vec<Expr>) -> Self {
        Expr::Or(parts)
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    pub fn is_null(self) -> Self {
        Expr::IsNull(Box::new(self))
    }

    /// Renders this expression as a single-line SQL fragment. Callers that
    /// need indentation wrap the result themselves (§4.6: the DSL owns
    /// rendering, not layout).
    pub fn sql(&self) -> String {
        match self {
            Expr::Param(name) => format!("${}", sanitize_ident(name)),
            Expr::Column(name) => name.clone(),
            Expr::Qualified(table, column) => format!("{table}.{column}"),
            Expr::LitText(s) => format!("'{}'", s.replace('\'', "''")),
            Expr::LitInt(n) => n.to_string(),
            Expr::LitBool(b) => b.to_string(),
            Expr::Null => "NULL".to_string(),
            Expr::EmptyTypedArray(ty) => format!("ARRAY[]::{ty}[]"),
            Expr::Array(items) => {
                let rendered: Vec<String> = items.iter().map(Expr::sql).collect();
                format!("ARRAY[{}]", rendered.join(", "))
            }
            Expr::List(items) => {
                let rendered: Vec<String> = items.iter().map(Expr::sql).collect();
                format!("({})", rendered.join(", "))
            }
            Expr::Raw(fragment) => fragment.clone(),
            Expr::Call(name, args) => {
                let rendered: Vec<String> = args.iter().map(Expr::sql).collect();
                format!("{name}({})", rendered.join(", "))
            }
            Expr::Alias(inner, name) => format!("{} AS {name}", inner.sql()),

            Expr::Eq(l, r) => format!("{} = {}", l.sql(), r.sql()),
            Expr::NotEq(l, r) => format!("{} != {}", l.sql(), r.sql()),
            Expr::Lt(l, r) => format!("{} < {}", l.sql(), r.sql()),
            Expr::Lte(l, r) => format!("{} <= {}", l.sql(), r.sql()),
            Expr::Gt(l, r) => format!("{} > {}", l.sql(), r.sql()),
            Expr::Gte(l, r) => format!("{} >= {}", l.sql(), r.sql()),

            // Empty string sets collapse to the identity value for their
            // combinator (§4.6): `x IN ()` can never match, `x NOT IN ()`
            // always holds.
            Expr::In(_, r) if is_empty_list(r) => "FALSE".to_string(),
            Expr::NotIn(_, r) if is_empty_list(r) => "TRUE".to_string(),
            Expr::In(l, r) => format!("{} IN {}", l.sql(), r.sql()),
            Expr::NotIn(l, r) => format!("{} NOT IN {}", l.sql(), r.sql()),

            Expr::And(parts) => variadic(parts, "AND"),
            Expr::Or(parts) => variadic(parts, "OR"),
            Expr::Not(inner) => format!("NOT ({})", inner.sql()),

            Expr::IsNull(inner) => format!("{} IS NULL", inner.sql()),
            Expr::IsNotNull(inner) => format!("{} IS NOT NULL", inner.sql()),

            Expr::Exists(select) => format!("EXISTS ({})", select.sql()),
            Expr::NotExists(select) => format!("NOT EXISTS ({})", select.sql()),

            Expr::Case(arms, else_branch) => {
                let mut out = String::from("CASE");
                for (cond, val) in arms {
                    out.push_str(&format!(" WHEN {} THEN {}", cond.sql(), val.sql()));
                }
                if let Some(else_branch) = else_branch {
                    out.push_str(&format!(" ELSE {}", else_branch.sql()));
                }
                out.push_str(" END");
                out
            }
        }
    }
}

fn is_empty_list(e: &Expr) -> bool {
    matches!(e, Expr::List(items) | Expr::Array(items) if items.is_empty())
}

/// AND/OR parenthesize their children when there are >= 2, matching the
/// DSL's "parenthesize variadic combinators with >= 2 children" rule.
fn variadic(parts: &[Expr], joiner: &str) -> String {
    if parts.is_empty() {
        return match joiner {
            "AND" => "TRUE".to_string(),
            _ => "FALSE".to_string(),
        };
    }
    if parts.len() == 1 {
        return parts[0].sql();
    }
    let rendered: Vec<String> = parts
        .iter()
        .map(|p| format!("({})", p.sql()))
        .collect();
    rendered.join(&format!(" {joiner} "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_renders_with_dollar_prefix() {
        assert_eq!(Expr::param("p_after").sql(), "$p_after");
    }

    #[test]
    fn variadic_and_parenthesizes_multiple_children() {
        let e = Expr::and(vec![
            Expr::column("a").eq(Expr::LitInt(1)),
            Expr::column("b").eq(Expr::LitInt(2)),
        ]);
        assert_eq!(e.sql(), "(a = 1) AND (b = 2)");
    }

    #[test]
    fn single_child_variadic_is_not_parenthesized() {
        let e = Expr::and(vec![Expr::column("a").eq(Expr::LitInt(1))]);
        assert_eq!(e.sql(), "a = 1");
    }

    #[test]
    fn text_literal_escapes_quotes() {
        assert_eq!(Expr::text("O'Brien").sql(), "'O''Brien'");
    }

    #[test]
    fn in_over_nonempty_set_renders_literally() {
        let e = Expr::column("relation").is_in(Expr::text_list(["owner", "admin"]));
        assert_eq!(e.sql(), "relation IN ('owner', 'admin')");
    }

    #[test]
    fn in_over_empty_set_collapses_to_false() {
        let e = Expr::column("relation").is_in(Expr::text_list(Vec::<String>::new()));
        assert_eq!(e.sql(), "FALSE");
    }

    #[test]
    fn not_in_over_empty_set_collapses_to_true() {
        let e = Expr::column("relation").not_in(Expr::text_list(Vec::<String>::new()));
        assert_eq!(e.sql(), "TRUE");
    }
}
