//! Cycle Validator (§4.1).
//!
//! Rejects a model in which a relation transitively implies itself within
//! the same type (`implied_by`, including the self-edge `R implied_by R`),
//! or where a parent/TTU chain cycles back through more than one distinct
//! `(type, relation)` node. A TTU chain that loops directly back to the
//! same `(type, relation)` it started from — the canonical "recurse through
//! my own parent" hierarchy pattern — is explicitly allowed.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::model::Model;

/// `(type, relation)` node identifier used throughout the compiler.
pub type NodeKey = (String, String);

#[derive(Clone, Copy, PartialEq, Eq)]
enum EdgeKind {
    ImpliedBy,
    Ttu,
}

pub fn validate(model: &Model) -> Result<()> {
    let mut edges: HashMap<NodeKey, Vec<(NodeKey, EdgeKind)>> = HashMap::new();

    for ty in &model.types {
        for rel in &ty.relations {
            let node = (ty.name.clone(), rel.name.clone());
            let mut deps = Vec::new();

            for implying in &rel.implied_by {
                deps.push(((ty.name.clone(), implying.clone()), EdgeKind::ImpliedBy));
            }

            for (target_relation, linking_relation) in &rel.parent_relations {
                if let Some(linking) = ty.get_relation(linking_relation) {
                    for target_type in direct_subject_types(linking) {
                        deps.push((
                            (target_type.to_string(), target_relation.clone()),
                            EdgeKind::Ttu,
                        ));
                    }
                }
            }

            edges.entry(node).or_default().extend(deps);
        }
    }

    let keys: Vec<NodeKey> = edges.keys().cloned().collect();
    let mut state: HashMap<NodeKey, VisitState> =
        keys.iter().map(|k| (k.clone(), VisitState::Unvisited)).collect();

    for start in &keys {
        visit(start, &edges, &mut state)?;
    }

    Ok(())
}

fn direct_subject_types(rel: &crate::model::RelationDefinition) -> Vec<&str> {
    rel.subject_type_refs
        .iter()
        .filter(|r| !r.is_userset())
        .map(|r| r.subject_type.as_str())
        .collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Unvisited,
    Visiting,
    Done,
}

fn visit(
    node: &NodeKey,
    edges: &HashMap<NodeKey, Vec<(NodeKey, EdgeKind)>>,
    state: &mut HashMap<NodeKey, VisitState>,
) -> Result<()> {
    match state.get(node) {
        Some(VisitState::Done) => return Ok(()),
        Some(VisitState::Visiting) => return Ok(()),
        _ => {}
    }

    state.insert(node.clone(), VisitState::Visiting);

    if let Some(deps) = edges.get(node) {
        for (dep, kind) in deps {
            if dep == node {
                // A same-relation, same-type TTU link back to itself is the
                // canonical "recurse through my own parent" hierarchy
                // pattern and is allowed. `R implied_by R` is not: it
                // asserts a relation is satisfied by itself, which is
                // vacuous and almost certainly a modeling mistake.
                if *kind == EdgeKind::ImpliedBy {
                    return Err(Error::cyclic_schema(format!(
                        "cyclic schema: {}.{} is implied by itself",
                        node.0, node.1
                    )));
                }
                continue;
            }
            if matches!(state.get(dep), Some(VisitState::Visiting)) {
                return Err(Error::cyclic_schema(format!(
                    "cyclic schema: {}.{} transitively depends on itself via {}.{}",
                    node.0, node.1, dep.0, dep.1
                )));
            }
            visit(dep, edges, state)?;
        }
    }

    state.insert(node.clone(), VisitState::Done);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;

    fn ty(name: &str, relations: Vec<RelationDefinition>) -> TypeDefinition {
        TypeDefinition {
            name: name.to_string(),
            relations,
        }
    }

    fn rel(name: &str) -> RelationDefinition {
        RelationDefinition {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn implied_by_self_edge_is_rejected() {
        let mut r = rel("a");
        r.implied_by = vec!["a".to_string()];
        let model = Model {
            types: vec![ty("resource", vec![r])],
        };
        let err = validate(&model).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::CyclicSchema);
    }

    #[test]
    fn implied_by_cycle_is_rejected() {
        // S2: a implied_by [c]; b implied_by [a]; c implied_by [b]
        let mut a = rel("a");
        a.implied_by = vec!["c".to_string()];
        let mut b = rel("b");
        b.implied_by = vec!["a".to_string()];
        let mut c = rel("c");
        c.implied_by = vec!["b".to_string()];
        let model = Model {
            types: vec![ty("resource", vec![a, b, c])],
        };
        let err = validate(&model).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::CyclicSchema);
    }

    #[test]
    fn same_relation_parent_recursion_is_allowed() {
        // org.can_read from org's own `parent` relation, same type & relation.
        let mut can_read = rel("can_read");
        can_read.parent_relations = vec![("can_read".to_string(), "parent".to_string())];
        let mut parent = rel("parent");
        parent.subject_type_refs = vec![SubjectTypeRef::direct("org")];
        let model = Model {
            types: vec![ty("org", vec![can_read, parent])],
        };
        assert!(validate(&model).is_ok());
    }

    #[test]
    fn ttu_same_relation_chain_accepted() {
        // S3: org -> repo -> issue, no cycle.
        let mut org_can_read = rel("can_read");
        org_can_read.implied_by = vec!["member".to_string()];
        let member = rel("member");

        let mut repo_can_read = rel("can_read");
        repo_can_read.parent_relations = vec![("can_read".to_string(), "org".to_string())];
        let mut repo_org = rel("org");
        repo_org.subject_type_refs = vec![SubjectTypeRef::direct("org")];

        let mut issue_can_read = rel("can_read");
        issue_can_read.parent_relations = vec![("can_read".to_string(), "repo".to_string())];
        let mut issue_repo = rel("repo");
        issue_repo.subject_type_refs = vec![SubjectTypeRef::direct("repo")];

        let model = Model {
            types: vec![
                ty("org", vec![org_can_read, member]),
                ty("repo", vec![repo_can_read, repo_org]),
                ty("issue", vec![issue_can_read, issue_repo]),
            ],
        };
        assert!(validate(&model).is_ok());
    }
}
