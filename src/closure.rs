//! Closure Computer (§4.2).
//!
//! Precomputes, for every `(object_type, relation)`, the transitive set of
//! relations on that type whose holding satisfies the target relation
//! through `implied_by`.

use std::collections::{HashMap, VecDeque};

use crate::model::Model;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureRow {
    pub object_type: String,
    pub relation: String,
    pub satisfying_relation: String,
    /// Debug metadata only — not load-bearing for any downstream decision.
    pub via_path: Vec<String>,
}

/// Computes the closure for every type in the model.
pub fn compute(model: &Model) -> Vec<ClosureRow> {
    let mut rows = Vec::new();

    for ty in &model.types {
        // adjacency[R] = relations that imply R directly.
        let adjacency: HashMap<&str, &[String]> = ty
            .relations
            .iter()
            .map(|r| (r.name.as_str(), r.implied_by.as_slice()))
            .collect();

        for rel in &ty.relations {
            let mut satisfying: Vec<(String, Vec<String>)> = vec![(rel.name.clone(), vec![])];
            let mut seen = std::collections::HashSet::new();
            seen.insert(rel.name.clone());

            let mut queue = VecDeque::new();
            queue.push_back((rel.name.clone(), Vec::<String>::new()));

            while let Some((current, path)) = queue.pop_front() {
                if let Some(implying) = adjacency.get(current.as_str()) {
                    for next in implying.iter() {
                        let mut next_path = path.clone();
                        next_path.push(current.clone());
                        if seen.insert(next.clone()) {
                            satisfying.push((next.clone(), next_path.clone()));
                            queue.push_back((next.clone(), next_path));
                        }
                    }
                }
            }

            // Deterministic emission order (§5, §9): sort lexicographically,
            // reflexive row first if it ties (it always does — `rel.name`
            // sorts on its own merits like anything else).
            satisfying.sort_by(|a, b| a.0.cmp(&b.0));

            for (satisfying_relation, via_path) in satisfying {
                rows.push(ClosureRow {
                    object_type: ty.name.clone(),
                    relation: rel.name.clone(),
                    satisfying_relation,
                    via_path,
                });
            }
        }
    }

    rows
}

/// Convenience lookup: the sorted list of relations (including `relation`
/// itself) whose holding satisfies `(object_type, relation)`.
pub fn satisfying_relations<'a>(
    rows: &'a [ClosureRow],
    object_type: &str,
    relation: &str,
) -> Vec<&'a str> {
    rows.iter()
        .filter(|r| r.object_type == object_type && r.relation == relation)
        .map(|r| r.satisfying_relation.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;

    #[test]
    fn s1_closure_transitivity() {
        // type resource { owner: [user]; admin implied_by [owner]; member implied_by [admin] }
        let owner = RelationDefinition {
            name: "owner".into(),
            subject_type_refs: vec![SubjectTypeRef::direct("user")],
            ..Default::default()
        };
        let admin = RelationDefinition {
            name: "admin".into(),
            implied_by: vec!["owner".into()],
            ..Default::default()
        };
        let member = RelationDefinition {
            name: "member".into(),
            implied_by: vec!["admin".into()],
            ..Default::default()
        };
        let model = Model {
            types: vec![TypeDefinition {
                name: "resource".into(),
                relations: vec![owner, admin, member],
            }],
        };

        let rows = compute(&model);

        assert_eq!(
            satisfying_relations(&rows, "resource", "owner"),
            vec!["owner"]
        );
        assert_eq!(
            satisfying_relations(&rows, "resource", "admin"),
            vec!["admin", "owner"]
        );
        assert_eq!(
            satisfying_relations(&rows, "resource", "member"),
            vec!["admin", "member", "owner"]
        );
    }

    #[test]
    fn reflexive_row_always_present() {
        let rel = RelationDefinition {
            name: "viewer".into(),
            ..Default::default()
        };
        let model = Model {
            types: vec![TypeDefinition {
                name: "doc".into(),
                relations: vec![rel],
            }],
        };
        let rows = compute(&model);
        assert_eq!(satisfying_relations(&rows, "doc", "viewer"), vec!["viewer"]);
    }
}
