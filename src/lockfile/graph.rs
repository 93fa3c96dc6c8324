// src/lockfile/graph.rs

use std::collections::{BTreeMap, BTreeSet};

use petgraph::Direction::{Incoming, Outgoing};
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::ProvisionError;
use crate::lockfile::LockedPackage;

/// Compute the install order for a set of pinned packages.
///
/// Edge direction: dependency -> dependent. For
///
/// ```toml
/// [[package]]
/// name = "B"
/// dependencies = ["A"]
/// ```
///
/// we add edge A -> B, so A is installed first. Among packages whose
/// dependencies are all installed, the lexicographically smallest name goes
/// next, so the order depends only on the lock's content.
pub fn install_order(packages: &[LockedPackage]) -> Result<Vec<String>, ProvisionError> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for pkg in packages {
        graph.add_node(pkg.name.as_str());
    }

    for pkg in packages {
        for dep in &pkg.dependencies {
            if !graph.contains_node(dep.as_str()) {
                return Err(ProvisionError::DependencyUnsatisfiable(format!(
                    "{}@{} depends on '{}', which is not pinned in the lock file",
                    pkg.name, pkg.version, dep
                )));
            }
            if dep == &pkg.name {
                return Err(ProvisionError::DependencyUnsatisfiable(format!(
                    "{}@{} depends on itself",
                    pkg.name, pkg.version
                )));
            }
            graph.add_edge(dep.as_str(), pkg.name.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    if let Err(cycle) = toposort(&graph, None) {
        return Err(ProvisionError::DependencyUnsatisfiable(format!(
            "dependency cycle involving package '{}'",
            cycle.node_id()
        )));
    }

    let mut pending: BTreeMap<&str, usize> = graph
        .nodes()
        .map(|n| (n, graph.neighbors_directed(n, Incoming).count()))
        .collect();
    let mut ready: BTreeSet<&str> = pending
        .iter()
        .filter(|(_, deps)| **deps == 0)
        .map(|(name, _)| *name)
        .collect();

    let mut order = Vec::with_capacity(pending.len());
    while let Some(next) = ready.pop_first() {
        order.push(next.to_string());
        for dependent in graph.neighbors_directed(next, Outgoing) {
            if let Some(left) = pending.get_mut(dependent) {
                *left -= 1;
                if *left == 0 {
                    ready.insert(dependent);
                }
            }
        }
    }
    Ok(order)
}
