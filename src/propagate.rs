//! Fixpoint Propagator (§4.5): walks analyses in dependency order,
//! propagating allowed subject types, wildcard flags, closure partitions,
//! userset complexity, indirect anchors, userset-chain depth and
//! self-reference detection. Also folds in the Eligibility Decider (§4.7,
//! §4.5 step 12) since it needs exactly the same dependency-ordered walk.

use std::collections::HashSet;

use crate::analysis::{
    AnalysisSet, AnchorPathStep, IndirectAnchor, ParentRelationInfo, RelationAnalysis,
    UsersetPattern,
};
use crate::depsort::NodeKey;
use crate::utils::push_unique;

const MAX_USERSET_DEPTH: i64 = 25;

pub fn run(set: &mut AnalysisSet, order: &[NodeKey]) {
    for (object_type, relation) in order {
        step_allowed_linking_types(set, object_type, relation);
        step_type_and_wildcard(set, object_type, relation);
        step_userset_closure(set, object_type, relation);
        step_closure_partition(set, object_type, relation);
        step_closure_exclusions(set, object_type, relation);
        step_excluded_partition(set, object_type, relation);
        step_depth(set, object_type, relation);
        step_self_referential_usersets(set, object_type, relation);
        step_indirect_anchor(set, object_type, relation);
        step_closure_aggregation(set, object_type, relation);
        step_eligibility(set, object_type, relation);
    }
}

fn dep(set: &AnalysisSet, object_type: &str, relation: &str) -> Option<RelationAnalysis> {
    set.get(object_type, relation).cloned()
}

/// §4.5 step 3: for each parent_relation (own + excluded), copy the linking
/// relation's `allowed_subject_types`, falling back to `direct_subject_types`
/// when the linking relation hasn't been propagated yet (safe because a
/// plain direct-only linking relation's allowed types equal its direct
/// types once it *is* propagated).
fn step_allowed_linking_types(set: &mut AnalysisSet, object_type: &str, relation: &str) {
    let Some(a) = dep(set, object_type, relation) else {
        return;
    };

    let resolve = |linking_relation: &str| -> Vec<String> {
        match dep(set, object_type, linking_relation) {
            Some(link) if !link.allowed_subject_types.is_empty() => link.allowed_subject_types,
            Some(link) => link.direct_subject_types,
            None => Vec::new(),
        }
    };

    let mut parent_relations = a.parent_relations.clone();
    for p in &mut parent_relations {
        p.allowed_linking_types = resolve(&p.linking_relation);
    }

    let mut excluded_parent_resolved = Vec::new();
    for (excluded_relation, linking_relation) in &a.excluded_parent_relations {
        excluded_parent_resolved.push((
            excluded_relation.clone(),
            linking_relation.clone(),
            resolve(linking_relation),
        ));
    }

    if let Some(a) = set.get_mut(object_type, relation) {
        a.parent_relations = parent_relations;
        a.excluded_parent_relations_resolved = excluded_parent_resolved;
    }
}

/// §4.5 step 1: accumulate `allowed_subject_types` and propagate the
/// wildcard flag from every contributing relation.
fn step_type_and_wildcard(set: &mut AnalysisSet, object_type: &str, relation: &str) {
    let Some(a) = dep(set, object_type, relation) else {
        return;
    };

    let mut types = Vec::new();
    let mut seen = HashSet::new();
    let mut has_wildcard = a.features.has_wildcard;

    // own direct types first, for a stable, legible ordering.
    for t in &a.direct_subject_types {
        push_unique(&mut types, &mut seen, t.clone());
    }

    for s in &a.satisfying_relations {
        if s == relation {
            continue;
        }
        if let Some(d) = dep(set, object_type, s) {
            for t in d.direct_subject_types.iter().chain(d.allowed_subject_types.iter()) {
                push_unique(&mut types, &mut seen, t.clone());
            }
            has_wildcard |= d.features.has_wildcard;
        }
    }

    for p in &a.userset_patterns {
        if let Some(d) = dep(set, &p.subject_type, &p.subject_relation) {
            for t in d.direct_subject_types.iter().chain(d.allowed_subject_types.iter()) {
                push_unique(&mut types, &mut seen, t.clone());
            }
            has_wildcard |= d.features.has_wildcard;
        } else {
            // The subject relation is the userset's own type+relation,
            // which is itself a valid subject type to allow through.
            push_unique(&mut types, &mut seen, p.subject_type.clone());
        }
    }

    for g in &a.intersection_groups {
        for r in &g.relations {
            if let Some(d) = dep(set, object_type, r) {
                for t in d.direct_subject_types.iter().chain(d.allowed_subject_types.iter()) {
                    push_unique(&mut types, &mut seen, t.clone());
                }
            }
        }
        for (target_relation, linking_relation) in &g.parent_relations {
            if let Some(link) = dep(set, object_type, linking_relation) {
                for target_type in link
                    .allowed_subject_types
                    .iter()
                    .chain(link.direct_subject_types.iter())
                {
                    if let Some(d) = dep(set, target_type, target_relation) {
                        for t in d.direct_subject_types.iter().chain(d.allowed_subject_types.iter())
                        {
                            push_unique(&mut types, &mut seen, t.clone());
                        }
                    }
                }
            }
        }
    }

    for p in &a.parent_relations {
        for target_type in &p.allowed_linking_types {
            if let Some(d) = dep(set, target_type, &p.relation) {
                for t in d.direct_subject_types.iter().chain(d.allowed_subject_types.iter()) {
                    push_unique(&mut types, &mut seen, t.clone());
                }
                has_wildcard |= d.features.has_wildcard;
            }
        }
    }

    if let Some(a) = set.get_mut(object_type, relation) {
        a.allowed_subject_types = types;
        a.features.has_wildcard = has_wildcard;
    }
}

/// §4.5 step 2 + 7: resolve each userset pattern's closure and flag
/// pattern- and relation-level complexity.
fn step_userset_closure(set: &mut AnalysisSet, object_type: &str, relation: &str) {
    let Some(a) = dep(set, object_type, relation) else {
        return;
    };

    let mut patterns = a.userset_patterns.clone();
    let mut has_complex = false;
    let mut unknown = Vec::new();

    for p in &mut patterns {
        match dep(set, &p.subject_type, &p.subject_relation) {
            Some(subject) => {
                p.satisfying_relations = subject.satisfying_relations.clone();
                p.has_wildcard = subject.features.has_wildcard;
                p.is_complex = subject
                    .satisfying_relations
                    .iter()
                    .any(|s| match dep(set, &p.subject_type, s) {
                        Some(member) => !member.features.is_closure_compatible(),
                        None => true,
                    });
            }
            None => {
                p.satisfying_relations = vec![p.subject_relation.clone()];
                p.is_complex = true;
                unknown.push(format!("{}#{}", p.subject_type, p.subject_relation));
            }
        }
        has_complex |= p.is_complex;
    }

    if let Some(a) = set.get_mut(object_type, relation) {
        a.userset_patterns = patterns;
        a.has_complex_userset_patterns = has_complex;
        a.unknown_references.extend(unknown);
    }
}

/// §4.5 step 4: partition `satisfying_relations \ {self}` into simple
/// (closure-compatible) and complex (not closure-compatible, but still
/// `can_generate`, which is always true).
fn step_closure_partition(set: &mut AnalysisSet, object_type: &str, relation: &str) {
    let Some(a) = dep(set, object_type, relation) else {
        return;
    };

    let mut simple = Vec::new();
    let mut complex = Vec::new();
    let mut unknown = Vec::new();

    for s in &a.satisfying_relations {
        if s == relation {
            continue;
        }
        match dep(set, object_type, s) {
            Some(member) if member.features.is_closure_compatible() => simple.push(s.clone()),
            Some(_) => complex.push(s.clone()),
            None => unknown.push(s.clone()),
        }
    }

    if let Some(a) = set.get_mut(object_type, relation) {
        a.simple_closure_relations = simple;
        a.complex_closure_relations = complex;
        a.unknown_references.extend(unknown);
    }
}

/// §4.5 step 5: union the excluded relations of each non-self satisfying
/// relation.
fn step_closure_exclusions(set: &mut AnalysisSet, object_type: &str, relation: &str) {
    let Some(a) = dep(set, object_type, relation) else {
        return;
    };

    let mut excluded = Vec::new();
    let mut seen = HashSet::new();
    for s in &a.satisfying_relations {
        if s == relation {
            continue;
        }
        if let Some(member) = dep(set, object_type, s) {
            for e in &member.excluded_relations {
                push_unique(&mut excluded, &mut seen, e.clone());
            }
        }
    }

    if let Some(a) = set.get_mut(object_type, relation) {
        a.closure_excluded_relations = excluded;
    }
}

/// §4.5 step 6: classify each excluded relation (own + closure-inherited)
/// as simple (no userset/recursive/exclusion/intersection *and* closure
/// size <= 1) or complex.
fn step_excluded_partition(set: &mut AnalysisSet, object_type: &str, relation: &str) {
    let Some(a) = dep(set, object_type, relation) else {
        return;
    };

    let mut all_excluded = Vec::new();
    let mut seen = HashSet::new();
    for e in a.excluded_relations.iter().chain(a.closure_excluded_relations.iter()) {
        push_unique(&mut all_excluded, &mut seen, e.clone());
    }

    let mut simple = Vec::new();
    let mut complex = Vec::new();
    let mut unknown = Vec::new();

    for e in &all_excluded {
        match dep(set, object_type, e) {
            Some(excl) => {
                let simply_resolvable =
                    excl.features.is_closure_compatible() && excl.satisfying_relations.len() <= 1;
                if simply_resolvable {
                    simple.push(e.clone());
                } else {
                    complex.push(e.clone());
                }
            }
            None => unknown.push(e.clone()),
        }
    }

    if let Some(a) = set.get_mut(object_type, relation) {
        a.simple_excluded_relations = simple;
        a.complex_excluded_relations = complex;
        a.unknown_references.extend(unknown);
    }
}

/// §4.5 step 8: DFS over userset patterns with memoization and an explicit
/// visiting set. A self-referential userset, or any cycle in the chain,
/// yields -1. Otherwise each hop contributes `1 + depth(subject)`.
fn step_depth(set: &mut AnalysisSet, object_type: &str, relation: &str) {
    if set.get(object_type, relation).is_none() {
        return;
    }

    let mut memo = std::collections::HashMap::new();
    let mut visiting = HashSet::new();
    let depth = userset_depth(set, object_type, relation, &mut visiting, &mut memo);

    if let Some(a) = set.get_mut(object_type, relation) {
        a.max_userset_depth = depth;
        a.exceeds_depth_limit = depth >= MAX_USERSET_DEPTH;
    }
}

fn userset_depth(
    set: &AnalysisSet,
    object_type: &str,
    relation: &str,
    visiting: &mut HashSet<NodeKey>,
    memo: &mut std::collections::HashMap<NodeKey, i64>,
) -> i64 {
    let key = (object_type.to_string(), relation.to_string());
    if let Some(&cached) = memo.get(&key) {
        return cached;
    }
    if visiting.contains(&key) {
        return -1;
    }
    let Some(a) = set.get(object_type, relation) else {
        return 0;
    };

    visiting.insert(key.clone());

    let mut max_depth = 0i64;
    let mut cyclic = false;

    for p in &a.userset_patterns {
        if p.subject_type == object_type && p.subject_relation == relation {
            cyclic = true;
            continue;
        }
        let sub_depth = userset_depth(set, &p.subject_type, &p.subject_relation, visiting, memo);
        if sub_depth < 0 {
            cyclic = true;
        } else {
            max_depth = max_depth.max(1 + sub_depth);
        }
    }

    // Walk implied relations' depths too: holding an implying relation
    // inherits its userset depth.
    for implying in a.satisfying_relations.iter().filter(|s| *s != relation) {
        let sub_depth = userset_depth(set, object_type, implying, visiting, memo);
        if sub_depth < 0 {
            cyclic = true;
        } else {
            max_depth = max_depth.max(sub_depth);
        }
    }

    visiting.remove(&key);

    let result = if cyclic { -1 } else { max_depth };
    memo.insert(key, result);
    result
}

/// §4.5 step 9: collect patterns where the userset points back at the
/// relation's own `(type, relation)`.
fn step_self_referential_usersets(set: &mut AnalysisSet, object_type: &str, relation: &str) {
    let Some(a) = dep(set, object_type, relation) else {
        return;
    };

    let self_ref: Vec<UsersetPattern> = a
        .userset_patterns
        .iter()
        .filter(|p| p.subject_type == object_type && p.subject_relation == relation)
        .cloned()
        .collect();

    if let Some(a) = set.get_mut(object_type, relation) {
        a.has_self_referential_userset = !self_ref.is_empty();
        a.self_referential_usersets = self_ref;
    }
}

/// §4.5 step 10: only attempted when the relation has no direct, implied,
/// or userset access of its own. DFS through `parent_relations`, preferring
/// target types with direct/implied access at each hop.
fn step_indirect_anchor(set: &mut AnalysisSet, object_type: &str, relation: &str) {
    let Some(a) = dep(set, object_type, relation) else {
        return;
    };

    if a.features.has_direct || a.features.has_implied || a.features.has_userset {
        return;
    }

    let mut visiting = HashSet::new();
    let anchor = find_anchor(set, object_type, relation, &mut visiting, Vec::new());

    if let Some(anchor) = anchor {
        let inherit_types = a.allowed_subject_types.is_empty();
        if let Some(a) = set.get_mut(object_type, relation) {
            if inherit_types {
                if let Some(anchor_analysis) = dep(set, &anchor.anchor_type, &anchor.anchor_relation)
                {
                    a.allowed_subject_types = anchor_analysis.allowed_subject_types.clone();
                    a.features.has_wildcard |= anchor_analysis.features.has_wildcard;
                }
            }
            a.indirect_anchor = Some(anchor);
        }
    }
}

fn find_anchor(
    set: &AnalysisSet,
    object_type: &str,
    relation: &str,
    visiting: &mut HashSet<NodeKey>,
    path: Vec<AnchorPathStep>,
) -> Option<IndirectAnchor> {
    let key = (object_type.to_string(), relation.to_string());
    if visiting.contains(&key) {
        return None;
    }
    visiting.insert(key.clone());

    let a = set.get(object_type, relation)?;

    for p in &a.parent_relations {
        let mut all_target_types = Vec::new();
        let mut recursive_types = Vec::new();
        let mut anchor_found = None;

        for target_type in &p.allowed_linking_types {
            let target = set.get(target_type, &p.relation);
            let Some(target) = target else { continue };

            if target_type == object_type {
                recursive_types.push(target_type.clone());
            }

            if target.features.has_direct || target.features.has_implied {
                all_target_types.push(target_type.clone());
                if anchor_found.is_none() {
                    anchor_found = Some(IndirectAnchor {
                        path: {
                            let mut full = path.clone();
                            full.push(AnchorPathStep::Ttu {
                                linking_relation: p.linking_relation.clone(),
                                target_type: target_type.clone(),
                                target_relation: p.relation.clone(),
                                all_target_types: Vec::new(),
                                recursive_types: Vec::new(),
                            });
                            full
                        },
                        anchor_type: target_type.clone(),
                        anchor_relation: p.relation.clone(),
                    });
                }
            }
        }

        if let Some(mut anchor) = anchor_found {
            if let Some(last) = anchor.path.last_mut() {
                if let Some((.., all, rec)) = last.as_ttu_mut() {
                    *all = all_target_types;
                    *rec = recursive_types;
                }
            }
            visiting.remove(&key);
            return Some(anchor);
        }

        for target_type in &p.allowed_linking_types {
            if target_type == object_type {
                continue;
            }
            let mut next_path = path.clone();
            next_path.push(AnchorPathStep::Ttu {
                linking_relation: p.linking_relation.clone(),
                target_type: target_type.clone(),
                target_relation: p.relation.clone(),
                all_target_types: Vec::new(),
                recursive_types: Vec::new(),
            });
            if let Some(found) = find_anchor(set, target_type, &p.relation, visiting, next_path) {
                visiting.remove(&key);
                return Some(found);
            }
        }
    }

    for p in &a.userset_patterns {
        let mut next_path = path.clone();
        next_path.push(AnchorPathStep::Userset {
            subject_type: p.subject_type.clone(),
            subject_relation: p.subject_relation.clone(),
        });
        if let Some(found) = find_anchor(
            set,
            &p.subject_type,
            &p.subject_relation,
            visiting,
            next_path,
        ) {
            visiting.remove(&key);
            return Some(found);
        }
    }

    visiting.remove(&key);
    None
}

/// §4.5 step 11: copy userset patterns and parent relations from non-self
/// satisfying relations into the closure aggregation fields, deduplicated
/// and tagged with their `source_relation`.
fn step_closure_aggregation(set: &mut AnalysisSet, object_type: &str, relation: &str) {
    let Some(a) = dep(set, object_type, relation) else {
        return;
    };

    let mut userset_patterns = Vec::new();
    let mut seen_userset = HashSet::new();
    let mut parent_relations: Vec<ParentRelationInfo> = Vec::new();
    let mut seen_parent = HashSet::new();

    for s in &a.satisfying_relations {
        if s == relation {
            continue;
        }
        if let Some(member) = dep(set, object_type, s) {
            for p in &member.userset_patterns {
                let key = p.key();
                if seen_userset.insert(key) {
                    let mut tagged = p.clone();
                    tagged.is_closure_pattern = true;
                    tagged.source_relation = Some(s.clone());
                    userset_patterns.push(tagged);
                }
            }
            for pr in &member.parent_relations {
                let key = (pr.relation.clone(), pr.linking_relation.clone());
                if seen_parent.insert(key) {
                    parent_relations.push(pr.clone());
                }
            }
        }
    }

    if let Some(a) = set.get_mut(object_type, relation) {
        a.closure_userset_patterns = userset_patterns;
        a.closure_parent_relations = parent_relations;
    }
}

/// §4.5 step 12 / §4.7: `can_generate_check` is always true (recorded only
/// for diagnostics — see §9(b)); `can_generate_list_value` actually gates
/// template selection.
fn step_eligibility(set: &mut AnalysisSet, object_type: &str, relation: &str) {
    let Some(a) = dep(set, object_type, relation) else {
        return;
    };

    let mut reason = String::new();
    let mut eligible = true;

    let has_access_path = a.has_standalone_access() || a.features.has_intersection;
    if !has_access_path && a.indirect_anchor.is_none() {
        eligible = false;
        reason = "no direct, implied, userset, recursive or intersection access path, \
                   and no indirect anchor was found"
            .to_string();
    }

    // Depth-exceeded relations are still "generatable": they emit the
    // depth_exceeded template which raises M2002 immediately (§4.7).

    let userset_only = (a.features.has_userset || !a.closure_userset_patterns.is_empty())
        && !a.features.has_direct
        && a.indirect_anchor.is_none();
    if eligible && userset_only && a.allowed_subject_types.is_empty() {
        eligible = false;
        reason = "access is only via userset patterns and no subject type could be resolved"
            .to_string();
    }

    if eligible {
        for s in &a.satisfying_relations {
            if s == relation {
                continue;
            }
            match dep(set, object_type, s) {
                Some(member) => {
                    if !member.can_generate_list_value {
                        eligible = false;
                        reason = format!("closure member {object_type}.{s} is not list-generatable");
                        break;
                    }
                    if member.features.has_intersection {
                        eligible = false;
                        reason = format!(
                            "closure member {object_type}.{s} uses intersection, which is \
                             not supported within a closure"
                        );
                        break;
                    }
                }
                None => {
                    eligible = false;
                    reason = format!("closure member {object_type}.{s} is unknown");
                    break;
                }
            }
        }
    }

    if let Some(a) = set.get_mut(object_type, relation) {
        a.can_generate = true;
        a.can_generate_list_value = eligible;
        a.cannot_generate_list_reason = reason;
    }
}
