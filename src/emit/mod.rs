//! SQL Emission (§4.9): turns a propagated [`RelationAnalysis`] plus its
//! selected template into CREATE-OR-REPLACE function text. Split into
//! [`check`] (the `check_*` family) and [`list`] (the `list_*_objects` /
//! `list_*_subjects` family); this module holds the pieces both share —
//! stable naming, the depth guard, and cursor pagination.

pub mod check;
pub mod list;

use crate::analysis::RelationAnalysis;
use crate::utils::sanitize_ident;

pub const PARAM_SUBJECT_TYPE: &str = "p_subject_type";
pub const PARAM_SUBJECT_ID: &str = "p_subject_id";
pub const PARAM_OBJECT_TYPE: &str = "p_object_type";
pub const PARAM_OBJECT_ID: &str = "p_object_id";
pub const PARAM_RELATION: &str = "p_relation";
pub const PARAM_VISITED: &str = "p_visited";
pub const PARAM_AFTER: &str = "p_after";
pub const PARAM_LIMIT: &str = "p_limit";

pub const DEPTH_LIMIT: i64 = 25;

fn ident(raw: &str) -> String {
    sanitize_ident(raw)
}

pub fn check_fn_name(object_type: &str, relation: &str) -> String {
    format!("check_{}_{}", ident(object_type), ident(relation))
}

pub fn check_no_wildcard_fn_name(object_type: &str, relation: &str) -> String {
    format!("{}_no_wildcard", check_fn_name(object_type, relation))
}

pub fn list_objects_fn_name(object_type: &str, relation: &str) -> String {
    format!("list_{}_{}_objects", ident(object_type), ident(relation))
}

pub fn list_subjects_fn_name(object_type: &str, relation: &str) -> String {
    format!("list_{}_{}_subjects", ident(object_type), ident(relation))
}

/// Standard function parameter list shared by every `check_*` variant.
pub fn check_params() -> String {
    format!(
        "{PARAM_SUBJECT_TYPE} TEXT, {PARAM_SUBJECT_ID} TEXT, {PARAM_OBJECT_TYPE} TEXT, \
         {PARAM_OBJECT_ID} TEXT, {PARAM_VISITED} TEXT[] DEFAULT ARRAY[]::TEXT[]"
    )
}

pub fn list_objects_params() -> String {
    format!(
        "{PARAM_SUBJECT_TYPE} TEXT, {PARAM_SUBJECT_ID} TEXT, {PARAM_AFTER} TEXT DEFAULT NULL, \
         {PARAM_LIMIT} INT DEFAULT NULL"
    )
}

pub fn list_subjects_params() -> String {
    format!(
        "{PARAM_OBJECT_TYPE} TEXT, {PARAM_OBJECT_ID} TEXT, {PARAM_AFTER} TEXT DEFAULT NULL, \
         {PARAM_LIMIT} INT DEFAULT NULL"
    )
}

/// The trailing parameters a `list_*_subjects` leaf function takes once
/// `p_object_type`/`p_object_id` are factored out — used by the
/// `list_accessible_subjects` dispatcher, which already declares those two
/// itself and must not redeclare them (a duplicate parameter name is a
/// Postgres function-definition error).
pub fn list_subjects_trailing_params() -> String {
    format!("{PARAM_AFTER} TEXT DEFAULT NULL, {PARAM_LIMIT} INT DEFAULT NULL")
}

/// The boilerplate that precomputes depth and raises `M2002` once
/// `v_depth >= 25`; shared by every recursive/pl-pgsql template.
pub fn depth_guard(depth_expr: &str) -> String {
    format!(
        "IF ({depth_expr}) >= {DEPTH_LIMIT} THEN\n\
         \x20\x20RAISE EXCEPTION 'resolution too complex' USING ERRCODE = 'M2002';\n\
         END IF;"
    )
}

/// `visited` cycle guard: `object_type:object_id:relation` membership check
/// against the carried `p_visited` array.
pub fn visited_key_expr(object_type_expr: &str, object_id_expr: &str, relation: &str) -> String {
    format!("{object_type_expr} || ':' || {object_id_expr} || ':' || '{relation}'")
}

/// Cursor pagination: wraps `inner_select` (assumed to project at least an
/// `id` column) in `base_results` / `paged` / `returned` / `next_cursor`
/// CTEs, per §4.9. `order_by` is the (possibly compound) `ORDER BY` clause;
/// `cursor_key` is a single scalar expression over the same columns used
/// for the `WHERE ... > p_after` comparison and the `max(...)` cursor
/// value — a comma-separated tuple like `order_by` is only legal inside
/// `ORDER BY` itself, not in a scalar predicate or `max()`.
pub fn paginate(inner_select: &str, order_by: &str, cursor_key: &str) -> String {
    format!(
        "base_results AS (\n{inner_select}\n),\n\
         paged AS (\n\
         \x20\x20SELECT * FROM base_results\n\
         \x20\x20WHERE {PARAM_AFTER} IS NULL OR {cursor_key} > {PARAM_AFTER}\n\
         \x20\x20ORDER BY {order_by}\n\
         \x20\x20LIMIT CASE WHEN {PARAM_LIMIT} IS NULL THEN NULL ELSE {PARAM_LIMIT} + 1 END\n\
         ),\n\
         returned AS (\n\
         \x20\x20SELECT * FROM paged\n\
         \x20\x20LIMIT {PARAM_LIMIT}\n\
         ),\n\
         next_cursor AS (\n\
         \x20\x20SELECT CASE WHEN (SELECT count(*) FROM paged) > coalesce({PARAM_LIMIT}, 2147483647)\n\
         \x20\x20\x20\x20\x20\x20\x20\x20\x20\x20THEN (SELECT max({cursor_key}) FROM returned)\n\
         \x20\x20\x20\x20\x20\x20\x20\x20\x20\x20ELSE NULL END AS cursor\n\
         )"
    )
}

/// `list_subjects`' `ORDER BY` key puts wildcard `'*'` first: `(is_not_
/// wildcard, subject_id)`. Only valid inside `ORDER BY` — see
/// [`subjects_cursor_key`] for the scalar form pagination comparisons use.
pub fn subjects_order_key() -> String {
    "(subject_id != '*'), subject_id".to_string()
}

/// A single scalar expression equivalent to [`subjects_order_key`]'s sort
/// order, usable in a `WHERE` comparison and inside `max(...)`: wildcard
/// rows get the `'0'` prefix so they sort before every other `'1'`-prefixed
/// `subject_id`.
pub fn subjects_cursor_key() -> String {
    "(CASE WHEN subject_id = '*' THEN '0' ELSE '1' END || subject_id)".to_string()
}

/// Renders a `'a', 'b', 'c'` list for `IN (...)`, or `NULL` when empty
/// (which makes `x IN (NULL)` evaluate to unknown/false, never true).
pub fn in_list(values: &[String]) -> String {
    if values.is_empty() {
        return "NULL".to_string();
    }
    values
        .iter()
        .map(|v| format!("'{}'", v.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Guard clause that returns immediately when `p_subject_type` isn't one
/// of the relation's allowed subject types. `early_return` is the
/// statement to execute (`RETURN FALSE;` for `check_*`, `RETURN;` for
/// `list_*`, since the latter streams rows via `RETURN QUERY`).
pub fn subject_type_guard(a: &RelationAnalysis, early_return: &str) -> String {
    if a.allowed_subject_types.is_empty() {
        return String::new();
    }
    let types: Vec<String> = a
        .allowed_subject_types
        .iter()
        .map(|t| format!("'{}'", t.replace('\'', "''")))
        .collect();
    format!(
        "IF {PARAM_SUBJECT_TYPE} NOT IN ({}) THEN\n  {early_return}\nEND IF;",
        types.join(", ")
    )
}
