//! Relation Analyzer (§4.3): populates the raw, pre-propagation fields of
//! each [`RelationAnalysis`] directly from the model and the precomputed
//! closure, with no cross-relation reasoning yet — that's the propagator's
//! job.

use itertools::Itertools;

use crate::analysis::{AnalysisSet, ParentRelationInfo, RelationAnalysis, UsersetPattern};
use crate::closure::{self, ClosureRow};
use crate::model::Model;

pub fn analyze(model: &Model, closure_rows: &[ClosureRow]) -> AnalysisSet {
    let mut set = AnalysisSet::default();

    for ty in &model.types {
        for rel in &ty.relations {
            let mut a = RelationAnalysis::new(ty.name.clone(), rel.name.clone());

            a.direct_subject_types = rel
                .subject_type_refs
                .iter()
                .filter(|r| !r.is_userset())
                .map(|r| r.subject_type.clone())
                .collect();

            a.features.has_wildcard = rel.subject_type_refs.iter().any(|r| r.wildcard);
            a.features.has_direct = !a.direct_subject_types.is_empty();
            a.features.has_implied = !rel.implied_by.is_empty();

            // Userset patterns, in input order, deduplicated by
            // (subject_type, subject_relation).
            a.userset_patterns = rel
                .subject_type_refs
                .iter()
                .filter(|r| r.is_userset())
                .unique_by(|r| (r.subject_type.clone(), r.subject_relation.clone()))
                .map(|r| UsersetPattern::new(r.subject_type.clone(), r.subject_relation.clone().unwrap()))
                .collect();
            a.features.has_userset = !a.userset_patterns.is_empty();

            a.parent_relations = rel
                .parent_relations
                .iter()
                .map(|(relation, linking)| ParentRelationInfo {
                    relation: relation.clone(),
                    linking_relation: linking.clone(),
                    allowed_linking_types: Vec::new(),
                })
                .collect();

            let intersection_has_parent = rel
                .intersection_groups
                .iter()
                .any(|g| !g.parent_relations.is_empty());
            a.features.has_recursive = !a.parent_relations.is_empty() || intersection_has_parent;

            a.excluded_relations = rel.excluded_relations.clone();
            a.excluded_parent_relations = rel.excluded_parent_relations.clone();
            a.excluded_intersection_groups = rel.excluded_intersection_groups.clone();
            a.features.has_exclusion = !a.excluded_relations.is_empty()
                || !a.excluded_parent_relations.is_empty()
                || !a.excluded_intersection_groups.is_empty();

            // Flatten each intersection part's exclusion map to "first
            // exclusion per relation" — a documented limitation (§9(a)):
            // multiple exclusions on the same relation within one
            // intersection part are not representable.
            a.intersection_groups = rel
                .intersection_groups
                .iter()
                .map(|g| {
                    let mut flattened = crate::model::IntersectionGroup {
                        relations: g.relations.clone(),
                        parent_relations: g.parent_relations.clone(),
                        exclusions: Default::default(),
                    };
                    for (rel_name, excl) in &g.exclusions {
                        if let Some(first) = excl.first() {
                            flattened
                                .exclusions
                                .insert(rel_name.clone(), vec![first.clone()]);
                        }
                    }
                    flattened
                })
                .collect();
            a.features.has_intersection = !a.intersection_groups.is_empty();

            a.satisfying_relations =
                closure::satisfying_relations(closure_rows, &ty.name, &rel.name)
                    .into_iter()
                    .map(|s| s.to_string())
                    .collect();

            set.insert(a);
        }
    }

    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;

    #[test]
    fn s4_complex_userset_raw_fields() {
        // group.admin: [user] but not blocked; doc.viewer: [group#admin]
        let member = RelationDefinition {
            name: "member".into(),
            subject_type_refs: vec![SubjectTypeRef::direct("user")],
            ..Default::default()
        };
        let blocked = RelationDefinition {
            name: "blocked".into(),
            subject_type_refs: vec![SubjectTypeRef::direct("user")],
            ..Default::default()
        };
        let admin = RelationDefinition {
            name: "admin".into(),
            subject_type_refs: vec![SubjectTypeRef::direct("user")],
            excluded_relations: vec!["blocked".into()],
            ..Default::default()
        };
        let viewer = RelationDefinition {
            name: "viewer".into(),
            subject_type_refs: vec![SubjectTypeRef::userset("group", "admin")],
            ..Default::default()
        };

        let model = Model {
            types: vec![
                TypeDefinition {
                    name: "group".into(),
                    relations: vec![member, blocked, admin],
                },
                TypeDefinition {
                    name: "doc".into(),
                    relations: vec![viewer],
                },
            ],
        };

        let rows = closure::compute(&model);
        let set = analyze(&model, &rows);

        let viewer = set.get("doc", "viewer").unwrap();
        assert!(viewer.features.has_userset);
        assert_eq!(viewer.userset_patterns.len(), 1);
        assert_eq!(viewer.userset_patterns[0].subject_type, "group");
        assert_eq!(viewer.userset_patterns[0].subject_relation, "admin");

        let admin = set.get("group", "admin").unwrap();
        assert!(admin.features.has_exclusion);
    }

    #[test]
    fn userset_patterns_deduplicated() {
        let viewer = RelationDefinition {
            name: "viewer".into(),
            subject_type_refs: vec![
                SubjectTypeRef::userset("group", "member"),
                SubjectTypeRef::userset("group", "member"),
            ],
            ..Default::default()
        };
        let model = Model {
            types: vec![TypeDefinition {
                name: "doc".into(),
                relations: vec![viewer],
            }],
        };
        let rows = closure::compute(&model);
        let set = analyze(&model, &rows);
        assert_eq!(set.get("doc", "viewer").unwrap().userset_patterns.len(), 1);
    }
}
