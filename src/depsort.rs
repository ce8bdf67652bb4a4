//! Dependency Sorter (§4.4): orders `(object_type, relation)` analyses so
//! that everything a relation's propagation reads has already been
//! propagated itself.

use crate::analysis::AnalysisSet;
use crate::utils::dependency_sort;

pub type NodeKey = (String, String);

/// Returns the dependency-sorted node order. Edges:
/// - closure: `R -> S` for each `S` in `satisfying_relations(R) \ {R}`.
/// - cross-type TTU: `R -> (target_type, parent.relation)` for each
///   `target_type` the linking relation's raw `direct_subject_types` names
///   (see [`linking_types`] — `allowed_linking_types` isn't populated until
///   the propagator runs, after this sort) that differs from `R`'s type
///   (same-type TTU is the allowed recursive case and is deliberately not a
///   dependency edge, since it would always form a cycle with itself).
/// - intersection parts that are plain relations on the same type.
/// - exclusion targets on the same type.
/// - same-type userset subjects (cross-type userset subjects are not
///   dependencies, since the subject side lives in a different type's
///   independently-ordered node set).
pub fn sort(set: &AnalysisSet) -> Vec<NodeKey> {
    let nodes: Vec<(NodeKey, Vec<NodeKey>)> = set
        .order
        .iter()
        .map(|key| {
            let a = set.by_key.get(key).expect("analysis present for its own key");
            let mut deps = Vec::new();

            for s in &a.satisfying_relations {
                if s != &a.relation {
                    deps.push((a.object_type.clone(), s.clone()));
                }
            }

            for p in &a.parent_relations {
                for target_type in linking_types(set, &a.object_type, &p.linking_relation) {
                    if target_type != a.object_type {
                        deps.push((target_type, p.relation.clone()));
                    }
                }
            }

            for g in &a.intersection_groups {
                for r in &g.relations {
                    deps.push((a.object_type.clone(), r.clone()));
                }
            }

            for r in &a.excluded_relations {
                deps.push((a.object_type.clone(), r.clone()));
            }
            for (r, _linking) in &a.excluded_parent_relations {
                deps.push((a.object_type.clone(), r.clone()));
            }

            for p in &a.userset_patterns {
                if p.subject_type == a.object_type {
                    deps.push((a.object_type.clone(), p.subject_relation.clone()));
                }
            }

            (key.clone(), deps)
        })
        .collect();

    dependency_sort(&nodes)
}

/// The linking relation's subject types, read directly from the model's
/// own raw `direct_subject_types` (populated by the analyzer, ahead of
/// sorting) rather than `allowed_linking_types`/`allowed_subject_types`,
/// neither of which exist yet at sort time — those are only filled in by
/// `propagate::step_allowed_linking_types` afterward, which itself must
/// run in dependency order.
fn linking_types(set: &AnalysisSet, object_type: &str, linking_relation: &str) -> Vec<String> {
    set.get(object_type, linking_relation)
        .map(|link| link.direct_subject_types.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ParentRelationInfo, RelationAnalysis};

    #[test]
    fn closure_dependency_orders_owner_before_admin() {
        let mut set = AnalysisSet::default();
        let mut owner = RelationAnalysis::new("resource", "owner");
        owner.satisfying_relations = vec!["owner".into()];
        let mut admin = RelationAnalysis::new("resource", "admin");
        admin.satisfying_relations = vec!["admin".into(), "owner".into()];
        set.insert(admin);
        set.insert(owner);

        let order = sort(&set);
        let owner_pos = order.iter().position(|k| k.1 == "owner").unwrap();
        let admin_pos = order.iter().position(|k| k.1 == "admin").unwrap();
        assert!(owner_pos < admin_pos);
    }

    /// Regression: cross-type TTU edges must come from the linking
    /// relation's raw `direct_subject_types`, not `allowed_linking_types`
    /// (which is only populated by the propagator, after sorting runs).
    /// `repo.can_read from org (linking=org)` must order `org.can_read`
    /// before `repo.can_read` even though `repo` is inserted first.
    #[test]
    fn cross_type_ttu_orders_target_type_before_source() {
        let mut set = AnalysisSet::default();

        let mut repo_can_read = RelationAnalysis::new("repo", "can_read");
        repo_can_read.satisfying_relations = vec!["can_read".into()];
        repo_can_read.parent_relations = vec![ParentRelationInfo {
            relation: "can_read".into(),
            linking_relation: "org".into(),
            allowed_linking_types: Vec::new(),
        }];
        let mut repo_org = RelationAnalysis::new("repo", "org");
        repo_org.satisfying_relations = vec!["org".into()];
        repo_org.direct_subject_types = vec!["org".into()];

        let mut org_can_read = RelationAnalysis::new("org", "can_read");
        org_can_read.satisfying_relations = vec!["can_read".into()];

        set.insert(repo_can_read);
        set.insert(repo_org);
        set.insert(org_can_read);

        let order = sort(&set);
        let repo_pos = order
            .iter()
            .position(|k| k.0 == "repo" && k.1 == "can_read")
            .unwrap();
        let org_pos = order
            .iter()
            .position(|k| k.0 == "org" && k.1 == "can_read")
            .unwrap();
        assert!(org_pos < repo_pos, "org.can_read must sort before repo.can_read, got order {order:?}");
    }
}
