//! Orderings used when assembling the catalog.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use super::naming::TableRef;

/// Case-insensitive name order with an exact tiebreak, so that `a` and `A`
/// still compare deterministically.
pub(crate) fn name_order(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

pub(crate) fn table_order(a: &TableRef, b: &TableRef) -> Ordering {
    name_order(&a.name, &b.name).then_with(|| a.schema.cmp(&b.schema))
}

/// Tables in foreign-key dependency order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyOrder {
    /// Referenced tables come before the tables referencing them.
    pub order: Vec<TableRef>,
    /// Groups of tables whose keys reference each other in a loop, each
    /// sorted by name.
    pub cycles: Vec<Vec<TableRef>>,
}

/// Order `tables` so that every table follows the tables it references.
///
/// `references` yields `(referenced, referencing)` pairs; pairs naming a
/// table outside `tables` and self-references are ignored. Ties go to the
/// alphabetically first table. A cycle is broken at its alphabetically
/// first table once nothing outside the cycle is still pending, and is
/// reported in [`DependencyOrder::cycles`].
pub fn dependency_order<'a>(
    tables: &[TableRef],
    references: impl IntoIterator<Item = (&'a TableRef, &'a TableRef)>,
) -> DependencyOrder {
    let mut sorted: Vec<&TableRef> = tables.iter().collect();
    sorted.sort_by(|a, b| table_order(a, b));
    sorted.dedup();

    // Nodes are added in alphabetical order, so index order is name order.
    let mut graph: DiGraph<&TableRef, ()> = DiGraph::new();
    let index: HashMap<&TableRef, NodeIndex> = sorted
        .iter()
        .map(|table| (*table, graph.add_node(*table)))
        .collect();

    for (referenced, referencing) in references {
        if referenced == referencing {
            continue;
        }
        if let (Some(&from), Some(&to)) = (index.get(referenced), index.get(referencing)) {
            graph.update_edge(from, to, ());
        }
    }

    let count = graph.node_count();
    let components = tarjan_scc(&graph);
    let mut component = vec![0; count];
    for (id, members) in components.iter().enumerate() {
        for node in members {
            component[node.index()] = id;
        }
    }

    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();
    let mut ready: BTreeSet<NodeIndex> = graph
        .node_indices()
        .filter(|n| in_degree[n.index()] == 0)
        .collect();
    let mut done = vec![false; count];
    let mut order = Vec::with_capacity(count);

    while order.len() < count {
        let next = match ready.pop_first() {
            Some(next) => next,
            // Only cycles remain. Break one that no other unfinished table
            // is waiting on.
            None => {
                let entry = graph.node_indices().find(|n| {
                    let own = component[n.index()];
                    !done[n.index()]
                        && graph
                            .neighbors_directed(*n, Direction::Incoming)
                            .all(|p| done[p.index()] || component[p.index()] == own)
                });
                match entry {
                    Some(entry) => entry,
                    None => break,
                }
            }
        };
        if done[next.index()] {
            continue;
        }
        done[next.index()] = true;
        order.push(graph[next].clone());

        for successor in graph.neighbors_directed(next, Direction::Outgoing) {
            let degree = &mut in_degree[successor.index()];
            *degree = degree.saturating_sub(1);
            if *degree == 0 && !done[successor.index()] {
                ready.insert(successor);
            }
        }
    }

    let mut cycles: Vec<Vec<TableRef>> = components
        .into_iter()
        .filter(|scc| scc.len() > 1)
        .map(|scc| {
            let mut members: Vec<TableRef> = scc.iter().map(|n| graph[*n].clone()).collect();
            members.sort_by(table_order);
            members
        })
        .collect();
    cycles.sort_by(|a, b| table_order(&a[0], &b[0]));

    DependencyOrder { order, cycles }
}
