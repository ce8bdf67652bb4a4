//! Emits `list_{type}_{relation}_objects` and `..._subjects` (§4.9),
//! dispatching on the [`crate::template::ListTemplate`] chosen for the
//! relation. Both directions share the same cursor-pagination shape; they
//! differ in which side of the tuple is bound to the caller's argument and
//! which side is projected.

use crate::analysis::RelationAnalysis;
use crate::emit::{
    in_list, list_objects_fn_name, list_objects_params, list_subjects_fn_name,
    list_subjects_params, paginate, subject_type_guard, subjects_cursor_key, subjects_order_key,
    DEPTH_LIMIT, PARAM_OBJECT_ID, PARAM_OBJECT_TYPE, PARAM_SUBJECT_ID, PARAM_SUBJECT_TYPE,
};
use crate::template::{select_list_template, ListTemplate};

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Objects,
    Subjects,
}

/// Returns `(list_objects_text, list_subjects_text)`.
pub fn emit(a: &RelationAnalysis) -> (String, String) {
    (
        emit_direction(a, Direction::Objects),
        emit_direction(a, Direction::Subjects),
    )
}

fn emit_direction(a: &RelationAnalysis, dir: Direction) -> String {
    let template = select_list_template(a);
    let name = match dir {
        Direction::Objects => list_objects_fn_name(&a.object_type, &a.relation),
        Direction::Subjects => list_subjects_fn_name(&a.object_type, &a.relation),
    };
    let params = match dir {
        Direction::Objects => list_objects_params(),
        Direction::Subjects => list_subjects_params(),
    };

    let (projected_column, order_by, cursor_key) = match dir {
        Direction::Objects => (
            "object_id".to_string(),
            "object_id".to_string(),
            "object_id".to_string(),
        ),
        Direction::Subjects => (
            "subject_id".to_string(),
            subjects_order_key(),
            subjects_cursor_key(),
        ),
    };

    if template == ListTemplate::DepthExceeded {
        return emit_depth_exceeded(&name, &params);
    }

    let base_select = match template {
        ListTemplate::SelfRefUserset => emit_self_ref_userset(a, dir, &projected_column),
        ListTemplate::Composed => emit_composed(a, dir, &projected_column),
        ListTemplate::Intersection => emit_intersection(a, dir, &projected_column),
        ListTemplate::Recursive => emit_recursive(a, dir, &projected_column),
        ListTemplate::Userset => emit_userset(a, dir, &projected_column),
        ListTemplate::Exclusion => emit_exclusion(a, dir, &projected_column),
        ListTemplate::Direct => emit_direct(a, dir, &projected_column),
        ListTemplate::DepthExceeded => unreachable!(),
    };

    let guard = match dir {
        Direction::Objects => subject_type_guard(a, "RETURN;"),
        Direction::Subjects => String::new(),
    };

    let cte = paginate(&base_select, &order_by, &cursor_key);
    let query = format!(
        "WITH {cte}\n\
         SELECT returned.{projected_column}, next_cursor.cursor FROM returned, next_cursor"
    );

    if guard.is_empty() {
        format!(
            "CREATE OR REPLACE FUNCTION {name}({params})\n\
             RETURNS TABLE ({projected_column} TEXT, next_cursor TEXT) AS $$\n\
             {query};\n\
             $$ LANGUAGE sql STABLE;"
        )
    } else {
        // `p_subject_type` outside the relation's allowed types short-circuits
        // to an empty result set — needs pl/pgsql, since a plain SQL function
        // body can't branch before its single query.
        format!(
            "CREATE OR REPLACE FUNCTION {name}({params})\n\
             RETURNS TABLE ({projected_column} TEXT, next_cursor TEXT) AS $$\n\
             BEGIN\n\
             \x20\x20{guard}\n\
             \x20\x20RETURN QUERY {query};\n\
             END;\n\
             $$ LANGUAGE plpgsql STABLE;"
        )
    }
}

fn emit_depth_exceeded(name: &str, params: &str) -> String {
    format!(
        "CREATE OR REPLACE FUNCTION {name}({params})\n\
         RETURNS TABLE (id TEXT, next_cursor TEXT) AS $$\n\
         BEGIN\n\
         \x20\x20RAISE EXCEPTION 'resolution too complex' USING ERRCODE = 'M2002';\n\
         END;\n\
         $$ LANGUAGE plpgsql STABLE;"
    )
}

fn direct_tuple_select(a: &RelationAnalysis, dir: Direction, projected_column: &str) -> String {
    let mut relations = a.simple_closure_relations.clone();
    relations.push(a.relation.clone());
    relations.sort();
    relations.dedup();
    let relation_list = in_list(&relations);

    match dir {
        Direction::Objects => format!(
            "SELECT DISTINCT object_id AS {projected_column} FROM melange_tuples\n\
             WHERE relation IN ({relation_list})\n\
             \x20\x20AND object_type = '{object_type}'\n\
             \x20\x20AND (subject_type = {PARAM_SUBJECT_TYPE} AND \
             (subject_id = {PARAM_SUBJECT_ID} OR subject_id = '*'))",
            object_type = a.object_type,
        ),
        Direction::Subjects => format!(
            "SELECT DISTINCT subject_id AS {projected_column} FROM melange_tuples\n\
             WHERE relation IN ({relation_list})\n\
             \x20\x20AND object_type = {PARAM_OBJECT_TYPE} AND object_id = {PARAM_OBJECT_ID}"
        ),
    }
}

fn emit_direct(a: &RelationAnalysis, dir: Direction, projected_column: &str) -> String {
    direct_tuple_select(a, dir, projected_column)
}

fn emit_exclusion(a: &RelationAnalysis, dir: Direction, projected_column: &str) -> String {
    let base = direct_tuple_select(a, dir, projected_column);
    let mut excluded = a.excluded_relations.clone();
    excluded.extend(a.closure_excluded_relations.clone());
    excluded.sort();
    excluded.dedup();
    if excluded.is_empty() {
        return base;
    }
    let excl_list = in_list(&excluded);
    match dir {
        Direction::Objects => format!(
            "{base}\n\
             EXCEPT\n\
             SELECT DISTINCT object_id AS {projected_column} FROM melange_tuples\n\
             WHERE relation IN ({excl_list}) AND object_type = '{object_type}'\n\
             \x20\x20AND subject_type = {PARAM_SUBJECT_TYPE} AND subject_id = {PARAM_SUBJECT_ID}",
            object_type = a.object_type,
        ),
        Direction::Subjects => format!(
            "{base}\n\
             EXCEPT\n\
             SELECT DISTINCT subject_id AS {projected_column} FROM melange_tuples\n\
             WHERE relation IN ({excl_list}) AND object_type = {PARAM_OBJECT_TYPE} \
             AND object_id = {PARAM_OBJECT_ID}"
        ),
    }
}

fn emit_userset(a: &RelationAnalysis, dir: Direction, projected_column: &str) -> String {
    let base = direct_tuple_select(a, dir, projected_column);
    if a.userset_patterns.is_empty() {
        return base;
    }
    let mut parts = vec![base];
    for p in &a.userset_patterns {
        let member_relations = in_list(&p.satisfying_relations);
        parts.push(match dir {
            Direction::Objects => format!(
                "SELECT DISTINCT grant_t.object_id AS {projected_column}\n\
                 FROM melange_tuples grant_t\n\
                 JOIN melange_tuples member_t\n\
                 \x20\x20ON member_t.object_type = grant_t.subject_type\n\
                 \x20\x20AND member_t.object_id = grant_t.subject_id\n\
                 WHERE grant_t.relation = '{}' AND grant_t.object_type = '{}'\n\
                 \x20\x20AND member_t.relation IN ({member_relations})\n\
                 \x20\x20AND member_t.subject_type = {PARAM_SUBJECT_TYPE}\n\
                 \x20\x20AND member_t.subject_id = {PARAM_SUBJECT_ID}",
                a.relation, a.object_type
            ),
            Direction::Subjects => format!(
                "SELECT DISTINCT member_t.subject_id AS {projected_column}\n\
                 FROM melange_tuples grant_t\n\
                 JOIN melange_tuples member_t\n\
                 \x20\x20ON member_t.object_type = grant_t.subject_type\n\
                 \x20\x20AND member_t.object_id = grant_t.subject_id\n\
                 WHERE grant_t.relation = '{}' AND grant_t.object_type = {PARAM_OBJECT_TYPE}\n\
                 \x20\x20AND grant_t.object_id = {PARAM_OBJECT_ID}\n\
                 \x20\x20AND member_t.relation IN ({member_relations})",
                a.relation
            ),
        });
    }
    parts.join("\nUNION\n")
}

/// `group.member: [group#member]` (nested groups): membership forms a
/// DAG over `(object_type, object_id)` nodes of the relation's own type,
/// with `grant_t.object_id --member--> grant_t.subject_id` edges.
/// `list_objects` (subject given, find enclosing groups) walks those edges
/// backwards — from a subject outward to the groups it's (transitively) a
/// member of; `list_subjects` (object given, find members) walks them
/// forwards — from a group down to its (transitive) members. The two
/// directions need distinct recursive steps, not a shared one.
fn emit_self_ref_userset(a: &RelationAnalysis, dir: Direction, projected_column: &str) -> String {
    let mut relations = a.simple_closure_relations.clone();
    relations.push(a.relation.clone());
    relations.sort();
    relations.dedup();
    let relation_list = in_list(&relations);

    let seed = match dir {
        Direction::Objects => format!(
            "SELECT DISTINCT object_id AS id, 0 AS depth FROM melange_tuples\n\
             \x20\x20WHERE relation IN ({relation_list})\n\
             \x20\x20\x20\x20AND object_type = '{object_type}'\n\
             \x20\x20\x20\x20AND (subject_type = {PARAM_SUBJECT_TYPE} AND \
             (subject_id = {PARAM_SUBJECT_ID} OR subject_id = '*'))",
            object_type = a.object_type,
        ),
        Direction::Subjects => format!(
            "SELECT DISTINCT subject_id AS id, 0 AS depth FROM melange_tuples\n\
             \x20\x20WHERE relation IN ({relation_list})\n\
             \x20\x20\x20\x20AND object_type = {PARAM_OBJECT_TYPE} AND object_id = {PARAM_OBJECT_ID}"
        ),
    };

    let linking_relations: Vec<String> = a
        .self_referential_usersets
        .iter()
        .map(|p| p.subject_relation.clone())
        .collect();
    let linking_list = in_list(&linking_relations);

    let step = match dir {
        // inner -> outer: inner is a member (subject) of some bigger group.
        Direction::Objects => format!(
            "SELECT grant_t.object_id, accessible.depth + 1\n\
             \x20\x20FROM melange_tuples grant_t\n\
             \x20\x20JOIN accessible ON accessible.id = grant_t.subject_id\n\
             \x20\x20WHERE grant_t.relation IN ({linking_list})\n\
             \x20\x20\x20\x20AND grant_t.object_type = '{object_type}'\n\
             \x20\x20\x20\x20AND accessible.depth < {DEPTH_LIMIT}",
            object_type = a.object_type,
        ),
        // outer -> inner: inner is itself a group, descend into its members.
        Direction::Subjects => format!(
            "SELECT grant_t.subject_id, accessible.depth + 1\n\
             \x20\x20FROM melange_tuples grant_t\n\
             \x20\x20JOIN accessible ON accessible.id = grant_t.object_id\n\
             \x20\x20WHERE grant_t.relation IN ({linking_list})\n\
             \x20\x20\x20\x20AND grant_t.object_type = '{object_type}'\n\
             \x20\x20\x20\x20AND accessible.depth < {DEPTH_LIMIT}",
            object_type = a.object_type,
        ),
    };

    format!(
        "WITH RECURSIVE accessible(id, depth) AS (\n\
         \x20\x20{seed}\n\
         \x20\x20UNION ALL\n\
         \x20\x20{step}\n\
         )\n\
         SELECT DISTINCT id AS {projected_column} FROM accessible"
    )
}

fn emit_recursive(a: &RelationAnalysis, dir: Direction, projected_column: &str) -> String {
    let mut parts = vec![direct_tuple_select(a, dir, projected_column)];
    for p in &a.parent_relations {
        parts.push(match dir {
            Direction::Objects => format!(
                "SELECT DISTINCT link_t.object_id AS {projected_column}\n\
                 FROM melange_tuples link_t\n\
                 WHERE link_t.relation = '{}' AND link_t.object_type = '{}'\n\
                 \x20\x20AND check_permission_internal({PARAM_SUBJECT_TYPE}, {PARAM_SUBJECT_ID}, \
                 '{}', link_t.subject_type, link_t.subject_id, ARRAY[]::TEXT[])",
                p.linking_relation, a.object_type, p.relation
            ),
            Direction::Subjects => format!(
                "SELECT DISTINCT check_t.subject_id AS {projected_column}\n\
                 FROM melange_tuples link_t\n\
                 JOIN melange_tuples check_t ON check_t.object_type = link_t.subject_type\n\
                 \x20\x20AND check_t.object_id = link_t.subject_id\n\
                 WHERE link_t.relation = '{}' AND link_t.object_type = {PARAM_OBJECT_TYPE}\n\
                 \x20\x20AND link_t.object_id = {PARAM_OBJECT_ID}\n\
                 \x20\x20AND check_t.relation = '{}'",
                p.linking_relation, p.relation
            ),
        });
    }
    parts.join("\nUNION\n")
}

fn emit_intersection(a: &RelationAnalysis, dir: Direction, projected_column: &str) -> String {
    let mut groups = Vec::new();
    for g in &a.intersection_groups {
        let mut parts: Vec<String> = Vec::new();
        for r in &g.relations {
            parts.push(match dir {
                Direction::Objects => format!(
                    "SELECT DISTINCT object_id AS {projected_column} FROM melange_tuples\n\
                     WHERE relation = '{r}' AND object_type = '{}'\n\
                     \x20\x20AND subject_type = {PARAM_SUBJECT_TYPE} AND subject_id = {PARAM_SUBJECT_ID}",
                    a.object_type
                ),
                Direction::Subjects => format!(
                    "SELECT DISTINCT subject_id AS {projected_column} FROM melange_tuples\n\
                     WHERE relation = '{r}' AND object_type = {PARAM_OBJECT_TYPE} \
                     AND object_id = {PARAM_OBJECT_ID}"
                ),
            });
        }
        if parts.is_empty() {
            continue;
        }
        groups.push(format!("({})", parts.join("\nINTERSECT\n")));
    }

    if groups.is_empty() {
        return direct_tuple_select(a, dir, projected_column);
    }

    let mut body = groups.join("\nUNION\n");
    for (rel_name, excluded) in a.intersection_groups.iter().flat_map(|g| &g.exclusions) {
        if let Some(excl) = excluded.first() {
            body = match dir {
                Direction::Objects => format!(
                    "{body}\nEXCEPT\nSELECT DISTINCT object_id AS {projected_column} \
                     FROM melange_tuples WHERE relation = '{excl}' AND object_type = '{}'\n\
                     \x20\x20AND subject_type = {PARAM_SUBJECT_TYPE} AND subject_id = {PARAM_SUBJECT_ID} \
                     /* excludes {rel_name} */",
                    a.object_type
                ),
                Direction::Subjects => format!(
                    "{body}\nEXCEPT\nSELECT DISTINCT subject_id AS {projected_column} \
                     FROM melange_tuples WHERE relation = '{excl}' AND object_type = {PARAM_OBJECT_TYPE} \
                     AND object_id = {PARAM_OBJECT_ID} /* excludes {rel_name} */"
                ),
            };
        }
    }
    body
}

fn emit_composed(a: &RelationAnalysis, dir: Direction, projected_column: &str) -> String {
    let Some(anchor) = &a.indirect_anchor else {
        return direct_tuple_select(a, dir, projected_column);
    };
    match dir {
        Direction::Objects => format!(
            "SELECT DISTINCT {projected_column} FROM list_{anchor_type}_{anchor_relation}_objects(\
             {PARAM_SUBJECT_TYPE}, {PARAM_SUBJECT_ID}) /* composed via {hops} hop(s) */",
            anchor_type = anchor.anchor_type,
            anchor_relation = anchor.anchor_relation,
            hops = anchor.path.len(),
        ),
        Direction::Subjects => format!(
            "SELECT DISTINCT {projected_column} FROM list_{anchor_type}_{anchor_relation}_subjects(\
             {PARAM_OBJECT_TYPE}, {PARAM_OBJECT_ID}) /* composed via {hops} hop(s) */",
            anchor_type = anchor.anchor_type,
            anchor_relation = anchor.anchor_relation,
            hops = anchor.path.len(),
        ),
    }
}

