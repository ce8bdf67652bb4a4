//! Dispatcher Emitter (§4.10): four routing functions that `CASE` on
//! `(object_type, relation)` to the specialized function for each relation.

use crate::analysis::AnalysisSet;
use crate::depsort::NodeKey;
use crate::emit::{
    check_fn_name, check_no_wildcard_fn_name, list_objects_fn_name, list_objects_params,
    list_subjects_fn_name, list_subjects_trailing_params, PARAM_AFTER, PARAM_LIMIT,
    PARAM_OBJECT_ID, PARAM_OBJECT_TYPE, PARAM_RELATION, PARAM_SUBJECT_ID, PARAM_SUBJECT_TYPE,
    PARAM_VISITED,
};

/// Unlike `check_params()`, `p_relation` is not defaulted and must come
/// before the defaulted `p_visited` (Postgres requires defaulted
/// parameters to be trailing).
fn dispatcher_check_params() -> String {
    format!(
        "{PARAM_SUBJECT_TYPE} TEXT, {PARAM_SUBJECT_ID} TEXT, {PARAM_OBJECT_TYPE} TEXT, \
         {PARAM_OBJECT_ID} TEXT, {PARAM_RELATION} TEXT, \
         {PARAM_VISITED} TEXT[] DEFAULT ARRAY[]::TEXT[]"
    )
}

pub fn emit_check_dispatcher(set: &AnalysisSet, order: &[NodeKey]) -> String {
    emit_check(set, order, check_fn_name, "check_permission")
}

pub fn emit_check_no_wildcard_dispatcher(set: &AnalysisSet, order: &[NodeKey]) -> String {
    emit_check(
        set,
        order,
        check_no_wildcard_fn_name,
        "check_permission_no_wildcard",
    )
}

fn emit_check(
    set: &AnalysisSet,
    order: &[NodeKey],
    fn_name: fn(&str, &str) -> String,
    dispatcher_name: &str,
) -> String {
    let mut arms = Vec::new();
    for (object_type, relation) in order {
        let Some(a) = set.get(object_type, relation) else {
            continue;
        };
        if !a.can_generate {
            continue;
        }
        let target = fn_name(object_type, relation);
        arms.push(format!(
            "WHEN {PARAM_OBJECT_TYPE} = '{object_type}' AND {PARAM_RELATION} = '{relation}' \
             THEN {target}({PARAM_SUBJECT_TYPE}, {PARAM_SUBJECT_ID}, {PARAM_OBJECT_TYPE}, \
             {PARAM_OBJECT_ID}, {PARAM_VISITED})"
        ));
    }

    format!(
        "CREATE OR REPLACE FUNCTION {dispatcher_name}({params})\n\
         RETURNS BOOLEAN AS $$\n\
         \x20\x20SELECT CASE\n\
         \x20\x20\x20\x20{arms}\n\
         \x20\x20\x20\x20ELSE FALSE\n\
         \x20\x20END;\n\
         $$ LANGUAGE sql STABLE;",
        params = dispatcher_check_params(),
        arms = arms.join("\n    "),
    )
}

pub fn emit_list_objects_dispatcher(set: &AnalysisSet, order: &[NodeKey]) -> String {
    emit_list(
        set,
        order,
        list_objects_fn_name,
        "list_accessible_objects",
        &list_objects_params(),
        PARAM_SUBJECT_TYPE,
        PARAM_SUBJECT_ID,
    )
}

pub fn emit_list_subjects_dispatcher(set: &AnalysisSet, order: &[NodeKey]) -> String {
    // The dispatcher signature below already declares p_object_type (as the
    // routing key) and p_relation; list_subjects_trailing_params() supplies
    // only p_after/p_limit so p_object_id isn't redeclared either — it's
    // forwarded from the dispatcher's own p_object_id parameter, added here.
    emit_list(
        set,
        order,
        list_subjects_fn_name,
        "list_accessible_subjects",
        &format!("{PARAM_OBJECT_ID} TEXT, {}", list_subjects_trailing_params()),
        PARAM_OBJECT_TYPE,
        PARAM_OBJECT_ID,
    )
}

/// Table-returning functions can't be routed with a plain `SELECT CASE`
/// (`CASE` yields one scalar per branch, not a row set), and the leaf
/// `list_*` functions don't all share a column name (`object_id` vs.
/// `subject_id`), so a by-name `SELECT col FROM target(...)` would fail to
/// resolve. Instead this emits a pl/pgsql body that `RETURN QUERY SELECT *`s
/// from the matched branch, which binds by position rather than by name.
fn emit_list(
    set: &AnalysisSet,
    order: &[NodeKey],
    fn_name: fn(&str, &str) -> String,
    dispatcher_name: &str,
    leaf_params: &str,
    arg0: &str,
    arg1: &str,
) -> String {
    let mut arms = Vec::new();
    for (object_type, relation) in order {
        let Some(a) = set.get(object_type, relation) else {
            continue;
        };
        if !a.can_generate_list_value {
            continue;
        }
        let target = fn_name(object_type, relation);
        arms.push(format!(
            "IF {PARAM_OBJECT_TYPE} = '{object_type}' AND {PARAM_RELATION} = '{relation}' THEN\n\
             \x20\x20\x20\x20RETURN QUERY SELECT * FROM {target}({arg0}, {arg1}, {PARAM_AFTER}, {PARAM_LIMIT});\n\
             \x20\x20\x20\x20RETURN;\n\
             \x20\x20END IF;"
        ));
    }

    format!(
        "CREATE OR REPLACE FUNCTION {dispatcher_name}({PARAM_OBJECT_TYPE} TEXT, {PARAM_RELATION} TEXT, {leaf_params})\n\
         RETURNS TABLE (id TEXT, next_cursor TEXT) AS $$\n\
         BEGIN\n\
         \x20\x20{arms}\n\
         \x20\x20RETURN;\n\
         END;\n\
         $$ LANGUAGE plpgsql STABLE;",
        arms = arms.join("\n  "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::RelationAnalysis;

    #[test]
    fn check_dispatcher_skips_non_generatable() {
        let mut set = AnalysisSet::default();
        let mut a = RelationAnalysis::new("doc", "viewer");
        a.can_generate = true;
        set.insert(a);
        let order = vec![("doc".to_string(), "viewer".to_string())];
        let sql = emit_check_dispatcher(&set, &order);
        assert!(sql.contains("check_doc_viewer"));
        assert!(sql.contains("check_permission"));
    }

    /// Regression: `list_accessible_subjects`'s signature must not
    /// redeclare `p_object_type` (once as its own routing key, once from
    /// a naively-forwarded `list_subjects_params()`) — a duplicate
    /// parameter name is a Postgres function-definition error.
    #[test]
    fn list_subjects_dispatcher_has_no_duplicate_parameter() {
        let mut set = AnalysisSet::default();
        let mut a = RelationAnalysis::new("doc", "viewer");
        a.can_generate_list_value = true;
        set.insert(a);
        let order = vec![("doc".to_string(), "viewer".to_string())];
        let sql = emit_list_subjects_dispatcher(&set, &order);
        let signature = sql
            .split_once('(')
            .and_then(|(_, rest)| rest.split_once(')'))
            .map(|(params, _)| params)
            .expect("signature has a parameter list");
        let param_names: Vec<&str> = signature
            .split(',')
            .filter_map(|p| p.trim().split_whitespace().next())
            .collect();
        let mut unique = param_names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(
            param_names.len(),
            unique.len(),
            "duplicate parameter name in {signature}"
        );
    }
}
