//! Dependency ordering
//!
//! Kahn's topological sort over the references between instances. Among
//! instances that are ready at the same time, the one submitted first goes
//! first, so the order is deterministic for a given input.

use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// An instance in the working set and the keys it references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub key: String,
    pub depends_on: Vec<String>,
}

impl Node {
    pub fn new<I, S>(key: &str, depends_on: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.to_string(),
            depends_on: depends_on.into_iter().map(Into::into).collect(),
        }
    }
}

/// The references form a cycle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dependency cycle: {}", path.join(" -> "))]
pub struct CyclicDependency {
    /// Keys around the cycle, first key repeated at the end
    pub path: Vec<String>,
}

/// Indices into `nodes`, dependencies before dependents
pub fn order(nodes: &[Node]) -> Result<Vec<usize>, CyclicDependency> {
    let deps = edges(nodes);
    kahn(nodes, &deps)
}

/// Indices into `nodes`, dependents before dependencies (deletion order)
pub fn order_reversed(nodes: &[Node]) -> Result<Vec<usize>, CyclicDependency> {
    let deps = edges(nodes);
    let mut dependents = vec![Vec::new(); nodes.len()];
    for (node, targets) in deps.iter().enumerate() {
        for &target in targets {
            dependents[target].push(node);
        }
    }

    // A cycle in the reversed graph is the same cycle; report it forwards
    kahn(nodes, &dependents).map_err(|_| match kahn(nodes, &deps) {
        Err(cycle) => cycle,
        Ok(_) => CyclicDependency { path: Vec::new() },
    })
}

/// Indices grouped by dependency depth: level 0 has no dependencies, level
/// n depends only on levels below n
pub fn levels(nodes: &[Node]) -> Result<Vec<Vec<usize>>, CyclicDependency> {
    let deps = edges(nodes);
    let sorted = kahn(nodes, &deps)?;

    let mut depth = vec![0usize; nodes.len()];
    for &node in &sorted {
        depth[node] = deps[node]
            .iter()
            .map(|&d| depth[d] + 1)
            .max()
            .unwrap_or(0);
    }

    let mut levels: Vec<Vec<usize>> = Vec::new();
    for (node, &d) in depth.iter().enumerate() {
        if levels.len() <= d {
            levels.resize_with(d + 1, Vec::new);
        }
        levels[d].push(node);
    }
    Ok(levels)
}

/// Dependency indices per node; unknown keys and duplicate edges dropped
fn edges(nodes: &[Node]) -> Vec<Vec<usize>> {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.key.as_str(), i))
        .collect();

    nodes
        .iter()
        .map(|node| {
            let mut targets: Vec<usize> = node
                .depends_on
                .iter()
                .filter_map(|key| index.get(key.as_str()).copied())
                .collect();
            targets.sort_unstable();
            targets.dedup();
            targets
        })
        .collect()
}

fn kahn(nodes: &[Node], deps: &[Vec<usize>]) -> Result<Vec<usize>, CyclicDependency> {
    let mut pending: Vec<usize> = deps.iter().map(Vec::len).collect();
    let mut dependents = vec![Vec::new(); nodes.len()];
    for (node, targets) in deps.iter().enumerate() {
        for &target in targets {
            dependents[target].push(node);
        }
    }

    let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|&i| pending[i] == 0).collect();
    let mut sorted = Vec::with_capacity(nodes.len());

    while let Some(node) = ready.pop_first() {
        sorted.push(node);
        for &dependent in &dependents[node] {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if sorted.len() == nodes.len() {
        Ok(sorted)
    } else {
        Err(find_cycle(nodes, deps, &pending))
    }
}

/// Walk unresolved dependencies from the first stuck node until a node
/// repeats. Every stuck node has at least one stuck dependency.
fn find_cycle(nodes: &[Node], deps: &[Vec<usize>], pending: &[usize]) -> CyclicDependency {
    let stuck = |i: usize| pending[i] > 0;
    let Some(start) = (0..nodes.len()).find(|&i| stuck(i)) else {
        return CyclicDependency { path: Vec::new() };
    };

    let mut path = vec![start];
    let mut current = start;
    loop {
        let Some(next) = deps[current].iter().copied().find(|&d| stuck(d)) else {
            break;
        };
        if let Some(pos) = path.iter().position(|&p| p == next) {
            path.drain(..pos);
            path.push(next);
            break;
        }
        path.push(next);
        current = next;
    }

    CyclicDependency {
        path: path.into_iter().map(|i| nodes[i].key.clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(nodes: &[Node], order: &[usize]) -> Vec<String> {
        order.iter().map(|&i| nodes[i].key.clone()).collect()
    }

    #[test]
    fn test_dependency_comes_first() {
        let nodes = vec![Node::new("b", ["a"]), Node::new("a", Vec::<String>::new())];
        let sorted = order(&nodes).unwrap();
        assert_eq!(keys(&nodes, &sorted), vec!["a", "b"]);
    }

    #[test]
    fn test_chain() {
        let nodes = vec![
            Node::new("c", ["b"]),
            Node::new("b", ["a"]),
            Node::new("a", Vec::<String>::new()),
        ];
        let sorted = order(&nodes).unwrap();
        assert_eq!(keys(&nodes, &sorted), vec!["a", "b", "c"]);

        let reversed = order_reversed(&nodes).unwrap();
        assert_eq!(keys(&nodes, &reversed), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_cycle_is_reported_with_path() {
        let nodes = vec![
            Node::new("a", ["c"]),
            Node::new("b", ["a"]),
            Node::new("c", ["b"]),
        ];
        let err = order(&nodes).unwrap_err();
        assert_eq!(err.path, vec!["a", "c", "b", "a"]);
        assert_eq!(err.to_string(), "dependency cycle: a -> c -> b -> a");

        assert_eq!(order_reversed(&nodes).unwrap_err(), err);
        assert_eq!(levels(&nodes).unwrap_err(), err);
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let nodes = vec![Node::new("a", ["a"])];
        assert_eq!(order(&nodes).unwrap_err().path, vec!["a", "a"]);
    }

    #[test]
    fn test_ties_follow_submission_order() {
        let nodes = vec![
            Node::new("x", Vec::<String>::new()),
            Node::new("y", ["z"]),
            Node::new("z", Vec::<String>::new()),
            Node::new("w", Vec::<String>::new()),
        ];
        let sorted = order(&nodes).unwrap();
        assert_eq!(keys(&nodes, &sorted), vec!["x", "z", "y", "w"]);
    }

    #[test]
    fn test_unknown_and_duplicate_edges_are_ignored() {
        let nodes = vec![
            Node::new("b", ["a", "a", "elsewhere"]),
            Node::new("a", Vec::<String>::new()),
        ];
        let sorted = order(&nodes).unwrap();
        assert_eq!(keys(&nodes, &sorted), vec!["a", "b"]);
    }

    #[test]
    fn test_every_edge_is_respected() {
        let nodes = vec![
            Node::new("stream", ["cluster"]),
            Node::new("consumer", ["cluster", "stream"]),
            Node::new("project", ["org"]),
            Node::new("cluster", ["org"]),
            Node::new("org", Vec::<String>::new()),
        ];
        let sorted = order(&nodes).unwrap();
        let position: HashMap<&str, usize> = sorted
            .iter()
            .enumerate()
            .map(|(pos, &i)| (nodes[i].key.as_str(), pos))
            .collect();

        for node in &nodes {
            for dep in &node.depends_on {
                assert!(position[dep.as_str()] < position[node.key.as_str()]);
            }
        }
    }

    #[test]
    fn test_levels() {
        let nodes = vec![
            Node::new("org", Vec::<String>::new()),
            Node::new("cluster", ["org"]),
            Node::new("project", ["org"]),
            Node::new("stream", ["cluster"]),
        ];
        let levels = levels(&nodes).unwrap();
        assert_eq!(levels, vec![vec![0], vec![1, 2], vec![3]]);
    }

    #[test]
    fn test_empty() {
        assert!(order(&[]).unwrap().is_empty());
        assert!(levels(&[]).unwrap().is_empty());
    }
}
