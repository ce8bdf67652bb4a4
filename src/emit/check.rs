//! Emits `check_{type}_{relation}` and its `_no_wildcard` twin (§4.9).
//!
//! `wildcard_mode` selects between `subject_id = p_subject_id OR subject_id
//! = '*'` and `subject_id = p_subject_id AND subject_id != '*'` wherever a
//! tuple lookup matches on `subject_id` — every other part of the body is
//! shared between the two variants.

use crate::analysis::RelationAnalysis;
use crate::emit::{
    check_fn_name, check_no_wildcard_fn_name, check_params, depth_guard, in_list,
    subject_type_guard, PARAM_OBJECT_ID, PARAM_OBJECT_TYPE, PARAM_RELATION, PARAM_SUBJECT_ID,
    PARAM_SUBJECT_TYPE, PARAM_VISITED,
};
use crate::template::{select_check_template, CheckTemplate};

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum WildcardMode {
    Allow,
    Exclude,
}

impl WildcardMode {
    fn subject_match(&self) -> &'static str {
        match self {
            WildcardMode::Allow => "(subject_id = p_subject_id OR subject_id = '*')",
            WildcardMode::Exclude => "(subject_id = p_subject_id AND subject_id != '*')",
        }
    }
}

/// Returns `(wildcard_variant, no_wildcard_variant)`.
pub fn emit(a: &RelationAnalysis) -> (String, String) {
    (
        emit_variant(a, WildcardMode::Allow),
        emit_variant(a, WildcardMode::Exclude),
    )
}

fn emit_variant(a: &RelationAnalysis, mode: WildcardMode) -> String {
    let name = match mode {
        WildcardMode::Allow => check_fn_name(&a.object_type, &a.relation),
        WildcardMode::Exclude => check_no_wildcard_fn_name(&a.object_type, &a.relation),
    };

    match select_check_template(a) {
        CheckTemplate::Sql => emit_sql_variant(a, &name, mode),
        CheckTemplate::PlPgsql => emit_plpgsql_variant(a, &name, mode),
    }
}

fn direct_tuple_predicate(a: &RelationAnalysis, mode: WildcardMode) -> Option<String> {
    let mut relations = a.simple_closure_relations.clone();
    relations.push(a.relation.clone());
    relations.sort();
    relations.dedup();

    if a.allowed_subject_types.is_empty() && !a.features.has_direct {
        return None;
    }

    let relation_list = in_list(&relations);
    let type_list = in_list(&a.allowed_subject_types);
    Some(format!(
        "EXISTS (\n\
         \x20\x20SELECT 1 FROM melange_tuples\n\
         \x20\x20WHERE object_type = {PARAM_OBJECT_TYPE} AND object_id = {PARAM_OBJECT_ID}\n\
         \x20\x20\x20\x20AND relation IN ({relation_list})\n\
         \x20\x20\x20\x20AND subject_type IN ({type_list})\n\
         \x20\x20\x20\x20AND {}\n\
         )",
        mode.subject_match()
    ))
}

fn complex_closure_predicate(a: &RelationAnalysis) -> Option<String> {
    if a.complex_closure_relations.is_empty() {
        return None;
    }
    let calls: Vec<String> = a
        .complex_closure_relations
        .iter()
        .map(|r| {
            format!(
                "check_permission_internal({PARAM_SUBJECT_TYPE}, {PARAM_SUBJECT_ID}, \
                 '{r}', {PARAM_OBJECT_TYPE}, {PARAM_OBJECT_ID}, {PARAM_VISITED})"
            )
        })
        .collect();
    Some(format!("({})", calls.join(" OR ")))
}

fn userset_predicate(a: &RelationAnalysis) -> Option<String> {
    if a.userset_patterns.is_empty() {
        return None;
    }
    let mut parts = Vec::new();
    for p in &a.userset_patterns {
        if p.is_complex {
            parts.push(format!(
                "EXISTS (\n\
                 \x20\x20SELECT 1 FROM melange_tuples grant_t\n\
                 \x20\x20WHERE grant_t.object_type = {PARAM_OBJECT_TYPE} AND grant_t.object_id = {PARAM_OBJECT_ID}\n\
                 \x20\x20\x20\x20AND grant_t.relation = '{}'\n\
                 \x20\x20\x20\x20AND grant_t.subject_type = '{}'\n\
                 \x20\x20\x20\x20AND check_permission_internal({PARAM_SUBJECT_TYPE}, {PARAM_SUBJECT_ID}, \
                 '{}', grant_t.subject_type, grant_t.subject_id, {PARAM_VISITED})\n\
                 )",
                a.relation, p.subject_type, p.subject_relation
            ));
        } else {
            parts.push(format!(
                "EXISTS (\n\
                 \x20\x20SELECT 1 FROM melange_tuples grant_t\n\
                 \x20\x20JOIN melange_tuples member_t\n\
                 \x20\x20\x20\x20ON member_t.object_type = grant_t.subject_type\n\
                 \x20\x20\x20\x20AND member_t.object_id = grant_t.subject_id\n\
                 \x20\x20WHERE grant_t.object_type = {PARAM_OBJECT_TYPE} AND grant_t.object_id = {PARAM_OBJECT_ID}\n\
                 \x20\x20\x20\x20AND grant_t.relation = '{}'\n\
                 \x20\x20\x20\x20AND member_t.relation IN ({})\n\
                 \x20\x20\x20\x20AND member_t.subject_type = {PARAM_SUBJECT_TYPE}\n\
                 \x20\x20\x20\x20AND member_t.subject_id = {PARAM_SUBJECT_ID}\n\
                 )",
                a.relation,
                in_list(&p.satisfying_relations)
            ));
        }
    }
    Some(format!("({})", parts.join(" OR ")))
}

fn ttu_predicate(a: &RelationAnalysis) -> Option<String> {
    if a.parent_relations.is_empty() {
        return None;
    }
    let mut parts = Vec::new();
    for p in &a.parent_relations {
        parts.push(format!(
            "EXISTS (\n\
             \x20\x20SELECT 1 FROM melange_tuples link_t\n\
             \x20\x20WHERE link_t.object_type = {PARAM_OBJECT_TYPE} AND link_t.object_id = {PARAM_OBJECT_ID}\n\
             \x20\x20\x20\x20AND link_t.relation = '{}'\n\
             \x20\x20\x20\x20AND check_permission_internal({PARAM_SUBJECT_TYPE}, {PARAM_SUBJECT_ID}, \
             '{}', link_t.subject_type, link_t.subject_id, {PARAM_VISITED})\n\
             )",
            p.linking_relation, p.relation
        ));
    }
    Some(format!("({})", parts.join(" OR ")))
}

fn intersection_predicate(a: &RelationAnalysis) -> Option<String> {
    if a.intersection_groups.is_empty() {
        return None;
    }
    let mut groups = Vec::new();
    for g in &a.intersection_groups {
        let mut parts: Vec<String> = g
            .relations
            .iter()
            .map(|r| {
                format!(
                    "check_permission_internal({PARAM_SUBJECT_TYPE}, {PARAM_SUBJECT_ID}, '{r}', \
                     {PARAM_OBJECT_TYPE}, {PARAM_OBJECT_ID}, {PARAM_VISITED})"
                )
            })
            .collect();
        for (target_relation, linking_relation) in &g.parent_relations {
            parts.push(format!(
                "EXISTS (\n\
                 \x20\x20SELECT 1 FROM melange_tuples link_t\n\
                 \x20\x20WHERE link_t.object_type = {PARAM_OBJECT_TYPE} AND link_t.object_id = {PARAM_OBJECT_ID}\n\
                 \x20\x20\x20\x20AND link_t.relation = '{linking_relation}'\n\
                 \x20\x20\x20\x20AND check_permission_internal({PARAM_SUBJECT_TYPE}, {PARAM_SUBJECT_ID}, \
                 '{target_relation}', link_t.subject_type, link_t.subject_id, {PARAM_VISITED})\n\
                 )"
            ));
        }
        for (rel_name, excluded) in &g.exclusions {
            if let Some(excl) = excluded.first() {
                parts.push(format!(
                    "NOT check_permission_internal({PARAM_SUBJECT_TYPE}, {PARAM_SUBJECT_ID}, \
                     '{excl}', {PARAM_OBJECT_TYPE}, {PARAM_OBJECT_ID}, {PARAM_VISITED}) /* excludes {rel_name} */"
                ));
            }
        }
        groups.push(format!("({})", parts.join(" AND ")));
    }
    Some(format!("({})", groups.join(" OR ")))
}

fn exclusion_predicate(a: &RelationAnalysis) -> Option<String> {
    let mut excluded = a.excluded_relations.clone();
    excluded.extend(a.closure_excluded_relations.clone());
    excluded.sort();
    excluded.dedup();
    if excluded.is_empty() {
        return None;
    }
    let parts: Vec<String> = excluded
        .iter()
        .map(|r| {
            format!(
                "check_permission_internal({PARAM_SUBJECT_TYPE}, {PARAM_SUBJECT_ID}, '{r}', \
                 {PARAM_OBJECT_TYPE}, {PARAM_OBJECT_ID}, {PARAM_VISITED})"
            )
        })
        .collect();
    Some(format!("NOT ({})", parts.join(" OR ")))
}

fn indirect_anchor_predicate(a: &RelationAnalysis) -> Option<String> {
    let anchor = a.indirect_anchor.as_ref()?;
    Some(format!(
        "check_permission_internal({PARAM_SUBJECT_TYPE}, {PARAM_SUBJECT_ID}, '{}', \
         '{}', {PARAM_OBJECT_ID}, {PARAM_VISITED}) /* composed anchor, {} hop(s) */",
        anchor.anchor_relation,
        anchor.anchor_type,
        anchor.path.len()
    ))
}

fn emit_sql_variant(a: &RelationAnalysis, name: &str, mode: WildcardMode) -> String {
    let mut standalone = Vec::new();
    standalone.extend(direct_tuple_predicate(a, mode));
    standalone.extend(complex_closure_predicate(a));
    standalone.extend(userset_predicate(a));

    let base = if standalone.is_empty() {
        "FALSE".to_string()
    } else {
        standalone.join(" OR ")
    };

    let body = match exclusion_predicate(a) {
        Some(excl) if a.features.has_exclusion => format!("({base}) AND ({excl})"),
        _ => base,
    };
    let select = crate::sql::pretty(&format!("SELECT {body}"));

    format!(
        "CREATE OR REPLACE FUNCTION {name}({params})\n\
         RETURNS BOOLEAN AS $$\n\
         {select};\n\
         $$ LANGUAGE sql STABLE;",
        params = check_params()
    )
}

fn emit_plpgsql_variant(a: &RelationAnalysis, name: &str, mode: WildcardMode) -> String {
    let mut standalone = Vec::new();
    standalone.extend(direct_tuple_predicate(a, mode));
    standalone.extend(complex_closure_predicate(a));
    standalone.extend(userset_predicate(a));
    standalone.extend(ttu_predicate(a));
    standalone.extend(intersection_predicate(a));
    standalone.extend(indirect_anchor_predicate(a));

    let mut body = if standalone.is_empty() {
        "FALSE".to_string()
    } else {
        standalone.join("\n    OR ")
    };

    if a.features.has_exclusion {
        if let Some(excl) = exclusion_predicate(a) {
            body = format!("({body}) AND ({excl})");
        }
    }

    let guard = subject_type_guard(a, "RETURN FALSE;");
    let depth = if a.max_userset_depth >= 0 {
        depth_guard(&format!("array_length({PARAM_VISITED}, 1)"))
    } else {
        String::new()
    };

    format!(
        "CREATE OR REPLACE FUNCTION {name}({params})\n\
         RETURNS BOOLEAN AS $$\n\
         BEGIN\n\
         \x20\x20{guard}\n\
         \x20\x20{depth}\n\
         \x20\x20RETURN {body};\n\
         END;\n\
         $$ LANGUAGE plpgsql STABLE;\n\
         -- {object_type}.{relation}: visited carries '{{object_type}}:{{object_id}}:{{relation}}' \
         keys for cycle detection; {param_relation} identifies the relation at the call site.",
        params = check_params(),
        object_type = a.object_type,
        relation = a.relation,
        param_relation = PARAM_RELATION,
    )
}
