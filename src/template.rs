//! Template Selector (§4.8): picks exactly one generation strategy per
//! relation, for both the `list_*` and `check_*` function families. The
//! ordering below is a priority list, evaluated top to bottom — the first
//! matching arm wins.

use crate::analysis::RelationAnalysis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display, strum_macros::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ListTemplate {
    /// `max_userset_depth >= 25`: emit a function that immediately raises
    /// `M2002` rather than attempting the walk.
    DepthExceeded,
    /// A userset pattern points back at this exact `(type, relation)`.
    SelfRefUserset,
    /// No direct/implied/userset access of its own; reached only through
    /// an [`crate::analysis::IndirectAnchor`].
    Composed,
    Intersection,
    /// Cross-type or same-type TTU recursion via `parent_relations`.
    Recursive,
    Userset,
    Exclusion,
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CheckTemplate {
    /// Recursive or otherwise control-flow-heavy access paths need a
    /// pl/pgsql function body.
    PlPgsql,
    /// Everything resolvable as a single boolean SQL expression.
    Sql,
}

pub fn select_list_template(a: &RelationAnalysis) -> ListTemplate {
    if a.exceeds_depth_limit {
        return ListTemplate::DepthExceeded;
    }
    if a.has_self_referential_userset {
        return ListTemplate::SelfRefUserset;
    }
    if a.indirect_anchor.is_some() {
        return ListTemplate::Composed;
    }
    if a.features.has_intersection {
        return ListTemplate::Intersection;
    }
    if a.features.has_recursive || !a.closure_parent_relations.is_empty() {
        return ListTemplate::Recursive;
    }
    if a.features.has_userset || !a.closure_userset_patterns.is_empty() {
        return ListTemplate::Userset;
    }
    if a.features.has_exclusion {
        return ListTemplate::Exclusion;
    }
    ListTemplate::Direct
}

pub fn select_check_template(a: &RelationAnalysis) -> CheckTemplate {
    if a.features.needs_pl_pgsql() || a.has_complex_userset_patterns || a.indirect_anchor.is_some() {
        CheckTemplate::PlPgsql
    } else {
        CheckTemplate::Sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::RelationAnalysis;

    #[test]
    fn depth_exceeded_wins_over_everything() {
        let mut a = RelationAnalysis::new("doc", "viewer");
        a.exceeds_depth_limit = true;
        a.features.has_intersection = true;
        assert_eq!(select_list_template(&a), ListTemplate::DepthExceeded);
    }

    #[test]
    fn plain_direct_relation_gets_direct_list_and_sql_check() {
        let mut a = RelationAnalysis::new("doc", "owner");
        a.features.has_direct = true;
        assert_eq!(select_list_template(&a), ListTemplate::Direct);
        assert_eq!(select_check_template(&a), CheckTemplate::Sql);
    }

    #[test]
    fn recursive_relation_needs_plpgsql() {
        let mut a = RelationAnalysis::new("repo", "can_read");
        a.features.has_recursive = true;
        assert_eq!(select_list_template(&a), ListTemplate::Recursive);
        assert_eq!(select_check_template(&a), CheckTemplate::PlPgsql);
    }

    /// Closure-inherited TTU parents (§4.8 item 5) route to Recursive even
    /// when the relation has no `parent_relations` of its own — only an
    /// `implied_by` chain to a relation that does.
    #[test]
    fn closure_parent_relations_alone_selects_recursive() {
        let mut a = RelationAnalysis::new("issue", "can_read");
        a.closure_parent_relations = vec![crate::analysis::ParentRelationInfo {
            relation: "can_read".into(),
            linking_relation: "repo".into(),
            allowed_linking_types: vec!["repo".into()],
        }];
        assert_eq!(select_list_template(&a), ListTemplate::Recursive);
    }

    /// Closure-inherited userset patterns (§4.8 item 6) route to Userset
    /// even when the relation has no `userset_patterns` of its own.
    #[test]
    fn closure_userset_patterns_alone_selects_userset() {
        let mut a = RelationAnalysis::new("doc", "viewer");
        a.closure_userset_patterns =
            vec![crate::analysis::UsersetPattern::new("group", "member")];
        assert_eq!(select_list_template(&a), ListTemplate::Userset);
    }

    /// Priority 3 (Composed) must win over priority 5 (Recursive) whenever
    /// an indirect anchor exists, per §4.8's strict ordering — a pure-TTU
    /// relation always has `has_recursive = true` alongside its anchor.
    #[test]
    fn composed_wins_over_recursive_when_anchor_present() {
        let mut a = RelationAnalysis::new("issue", "can_read");
        a.features.has_recursive = true;
        a.indirect_anchor = Some(crate::analysis::IndirectAnchor {
            path: vec![],
            anchor_type: "org".into(),
            anchor_relation: "can_read".into(),
        });
        assert_eq!(select_list_template(&a), ListTemplate::Composed);
    }

    /// Invariant 7 (§8): every list template name is distinct and renders to
    /// a non-empty, lowercase identifier suitable for logging.
    #[test]
    fn every_list_template_has_a_distinct_snake_case_name() {
        use strum::IntoEnumIterator;
        let names: Vec<String> = ListTemplate::iter().map(|t| t.to_string()).collect();
        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(names.len(), unique.len());
        assert!(names.iter().all(|n| n.chars().all(|c| c.is_ascii_lowercase() || c == '_')));
    }
}
