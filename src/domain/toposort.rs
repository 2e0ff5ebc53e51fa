//! Deterministic topological ordering with cycle reporting.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Order `deps` (node -> nodes it depends on) so every node comes after its
/// dependencies. Independent nodes come out in ascending key order.
///
/// Dependencies that are not themselves keys are ignored. On a cycle the
/// error holds one offending path, closed by repeating its first node.
pub fn toposort<K>(deps: &BTreeMap<K, Vec<K>>) -> Result<Vec<K>, Vec<K>>
where
    K: Ord + Clone,
{
    let mut indegree: BTreeMap<&K, usize> = deps.keys().map(|k| (k, 0)).collect();
    let mut dependents: BTreeMap<&K, Vec<&K>> = BTreeMap::new();

    for (node, node_deps) in deps {
        let unique: BTreeSet<&K> = node_deps.iter().filter(|d| deps.contains_key(*d)).collect();
        for dep in unique {
            dependents.entry(dep).or_default().push(node);
            if let Some(n) = indegree.get_mut(node) {
                *n += 1;
            }
        }
    }

    let mut ready: BTreeSet<&K> = indegree
        .iter()
        .filter(|(_, n)| **n == 0)
        .map(|(k, _)| *k)
        .collect();
    let mut order = Vec::with_capacity(deps.len());

    while let Some(node) = ready.pop_first() {
        order.push(node.clone());
        for dependent in dependents.get(node).into_iter().flatten() {
            if let Some(n) = indegree.get_mut(dependent) {
                *n -= 1;
                if *n == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    if order.len() == deps.len() {
        return Ok(order);
    }

    let done: BTreeSet<&K> = order.iter().collect();
    let remaining: BTreeSet<&K> = deps.keys().filter(|k| !done.contains(k)).collect();
    Err(find_cycle(deps, &remaining))
}

fn find_cycle<K>(deps: &BTreeMap<K, Vec<K>>, remaining: &BTreeSet<&K>) -> Vec<K>
where
    K: Ord + Clone,
{
    // Every remaining node has at least one remaining dependency, so walking
    // them must revisit a node.
    let Some(&start) = remaining.iter().next() else {
        return Vec::new();
    };
    let mut path: Vec<&K> = vec![start];
    let mut seen: VecDeque<&K> = VecDeque::from([start]);
    let mut current = start;
    loop {
        let next = deps
            .get(current)
            .and_then(|ds| ds.iter().find(|d| remaining.contains(d)));
        let Some(next) = next else {
            return path.into_iter().cloned().collect();
        };
        if let Some(pos) = seen.iter().position(|k| *k == next) {
            let mut cycle: Vec<K> = path[pos..].iter().map(|k| (*k).clone()).collect();
            cycle.push(next.clone());
            return cycle;
        }
        path.push(next);
        seen.push_back(next);
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&'static str, &[&'static str])]) -> BTreeMap<&'static str, Vec<&'static str>> {
        edges.iter().map(|(k, ds)| (*k, ds.to_vec())).collect()
    }

    #[test]
    fn orders_dependencies_first() {
        let g = graph(&[("cross", &["fast", "slow"]), ("fast", &[]), ("slow", &[])]);
        assert_eq!(toposort(&g).unwrap(), vec!["fast", "slow", "cross"]);
    }

    #[test]
    fn chain() {
        let g = graph(&[("a", &["b"]), ("b", &["c"]), ("c", &[])]);
        assert_eq!(toposort(&g).unwrap(), vec!["c", "b", "a"]);
    }

    #[test]
    fn ignores_external_dependencies() {
        let g = graph(&[("a", &["close"]), ("b", &["a", "a"])]);
        assert_eq!(toposort(&g).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn reports_cycle_path() {
        let g = graph(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"]), ("d", &[])]);
        let cycle = toposort(&g).unwrap_err();
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 4);
        for name in ["a", "b", "c"] {
            assert!(cycle.contains(&name));
        }
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let g = graph(&[("a", &["a"])]);
        assert_eq!(toposort(&g).unwrap_err(), vec!["a", "a"]);
    }

    #[test]
    fn cycle_behind_a_tail() {
        // x depends on a cycle but is not part of it
        let g = graph(&[("x", &["y"]), ("y", &["z"]), ("z", &["y"])]);
        let cycle = toposort(&g).unwrap_err();
        assert!(!cycle.contains(&"x"));
        assert_eq!(cycle.first(), cycle.last());
    }
}
