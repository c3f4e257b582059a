use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::schema::SchemaDescriptor;

/// Summary of FK graph structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencySummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Report for FK dependency ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyReport {
    pub summary: DependencySummary,
    /// Tables with every referenced table ahead of its dependents.
    pub topo_order: Option<Vec<String>>,
    /// Tables that could not be ordered because they sit on or behind a cycle.
    pub cycle: Option<Vec<String>>,
}

/// Build a deterministic FK dependency report for a schema.
///
/// Ties between tables that are ready at the same time are broken by table
/// name, ascending.
pub fn build_dependency_report(schema: &SchemaDescriptor) -> DependencyReport {
    let graph = build_adjacency(schema);
    let nodes = graph.len();
    let edges = graph.values().map(|targets| targets.len()).sum();
    let summary = DependencySummary { nodes, edges };

    match toposort(&graph) {
        Ok(order) => DependencyReport {
            summary,
            topo_order: Some(order),
            cycle: None,
        },
        Err(cycle) => DependencyReport {
            summary,
            topo_order: None,
            cycle: Some(cycle),
        },
    }
}

/// Edges point from a referenced table to the tables that reference it.
fn build_adjacency(schema: &SchemaDescriptor) -> BTreeMap<String, BTreeSet<String>> {
    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for table in &schema.tables {
        graph.entry(table.name.clone()).or_default();

        for referenced in table.depends_on() {
            graph
                .entry(referenced)
                .or_default()
                .insert(table.name.clone());
        }
    }

    graph
}

fn toposort(graph: &BTreeMap<String, BTreeSet<String>>) -> Result<Vec<String>, Vec<String>> {
    let mut indegree: BTreeMap<&str, usize> =
        graph.keys().map(|node| (node.as_str(), 0)).collect();

    for targets in graph.values() {
        for target in targets {
            *indegree.entry(target.as_str()).or_insert(0) += 1;
        }
    }

    let mut ready: BTreeSet<&str> = indegree
        .iter()
        .filter_map(|(node, count)| if *count == 0 { Some(*node) } else { None })
        .collect();

    let mut order = Vec::with_capacity(graph.len());

    while let Some(node) = ready.pop_first() {
        order.push(node.to_string());

        if let Some(targets) = graph.get(node) {
            for target in targets {
                if let Some(count) = indegree.get_mut(target.as_str()) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(target.as_str());
                    }
                }
            }
        }
    }

    if order.len() == graph.len() {
        Ok(order)
    } else {
        Err(indegree
            .into_iter()
            .filter_map(|(node, count)| if count > 0 { Some(node.to_string()) } else { None })
            .collect())
    }
}
