use std::collections::HashMap;
use std::hash::Hash;

/// Topologically sorts `nodes`, each given as `(key, dependencies)`, so that
/// every dependency appears before the node that needs it.
///
/// Unlike a strict toposort, this tolerates cycles: the only cycles the
/// dependency graph built in §4.4 can contain are self-parent recursion
/// (`R` depends on itself through a same-relation TTU chain), which is
/// explicitly allowed by the cycle validator. When the DFS revisits a node
/// it is already in the middle of resolving, the back-edge is simply
/// dropped rather than treated as an error, and the node is still emitted
/// once its other dependencies are satisfied.
pub fn dependency_sort<Key: Eq + Hash + Clone>(nodes: &[(Key, Vec<Key>)]) -> Vec<Key> {
    let index: HashMap<&Key, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, (key, _))| (key, i))
        .collect();

    let dag: Vec<Vec<usize>> = nodes
        .iter()
        .map(|(_, deps)| deps.iter().filter_map(|d| index.get(d).copied()).collect())
        .collect();

    let mut state = vec![NodeState::Unvisited; nodes.len()];
    let mut order = Vec::with_capacity(nodes.len());

    for start in 0..nodes.len() {
        visit(start, &dag, &mut state, &mut order);
    }

    order.into_iter().map(|i| nodes[i].0.clone()).collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Unvisited,
    Visiting,
    Done,
}

fn visit(n: usize, dag: &[Vec<usize>], state: &mut [NodeState], order: &mut Vec<usize>) {
    match state[n] {
        NodeState::Done | NodeState::Visiting => return,
        NodeState::Unvisited => {}
    }
    state[n] = NodeState::Visiting;
    for &dep in &dag[n] {
        visit(dep, dag, state, order);
    }
    state[n] = NodeState::Done;
    order.push(n);
}

#[cfg(test)]
mod tests {
    use super::dependency_sort;

    #[test]
    fn linear_chain() {
        let nodes = vec![
            ("member", vec!["admin"]),
            ("admin", vec!["owner"]),
            ("owner", vec![]),
        ];
        assert_eq!(dependency_sort(&nodes), vec!["owner", "admin", "member"]);
    }

    #[test]
    fn independent_nodes_keep_relative_order() {
        let nodes = vec![("a", vec![]), ("b", vec![]), ("c", vec!["b"])];
        assert_eq!(dependency_sort(&nodes), vec!["a", "b", "c"]);
    }

    #[test]
    fn self_parent_recursion_does_not_hang() {
        // `can_read` depends on itself through a same-relation TTU chain.
        let nodes = vec![("can_read", vec!["can_read"])];
        assert_eq!(dependency_sort(&nodes), vec!["can_read"]);
    }

    #[test]
    fn cross_type_self_cycle_still_resolves() {
        // org.can_read -> repo.can_read -> issue.can_read -> org.can_read
        let nodes = vec![
            ("org.can_read", vec!["issue.can_read"]),
            ("repo.can_read", vec!["org.can_read"]),
            ("issue.can_read", vec!["repo.can_read"]),
        ];
        let order = dependency_sort(&nodes);
        assert_eq!(order.len(), 3);
    }
}
