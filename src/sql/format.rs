//! Layout helpers (§4.6): indentation, comment-wrapped blocks, and the
//! `v_` prefixed `SELECT ... INTO` shorthand used throughout emitted
//! pl/pgsql bodies.

/// Runs a plain SQL fragment (a `SELECT`, not a full `CREATE FUNCTION ...
/// $$ ... $$` body) through `sqlformat` for a stable, readable layout.
/// Used only on fragments that are themselves valid standalone SQL — the
/// surrounding pl/pgsql control flow (`IF`, `RAISE`, `BEGIN`/`END`) is left
/// to the emitter's own templates, since a query formatter isn't meant to
/// reflow procedural code.
pub fn pretty(sql: &str) -> String {
    sqlformat::format(
        sql,
        &sqlformat::QueryParams::default(),
        sqlformat::FormatOptions::default(),
    )
}

pub fn indent(text: &str, levels: usize) -> String {
    let prefix = "  ".repeat(levels);
    text.lines()
        .map(|line| {
            if line.is_empty() {
                line.to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn dedent(text: &str) -> String {
    let min_indent = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    text.lines()
        .map(|l| l.get(min_indent.min(l.len())..).unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wraps `body` in a `-- name ---` banner comment, matching the header
/// style used across every emitted function.
pub fn comment_block(title: &str, body: &str) -> String {
    format!("-- {title}\n{body}")
}

/// `v_{name} := ({expr});` — the standard local-variable assignment
/// idiom used in every generated pl/pgsql body.
pub fn select_into(variable: &str, expr: &str) -> String {
    format!("v_{variable} := ({expr});")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indent_prefixes_nonempty_lines() {
        assert_eq!(indent("a\n\nb", 1), "  a\n\n  b");
    }

    #[test]
    fn dedent_strips_common_prefix() {
        assert_eq!(dedent("  a\n  b"), "a\nb");
    }
}
