//! Connection graph over components.

use std::collections::VecDeque;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::model::{ComponentId, ConnectionId, TimingModel};

/// Directed graph with one node per component and one edge per connection.
pub struct ConnectionGraph {
    graph: DiGraph<ComponentId, ConnectionId>,
}

impl ConnectionGraph {
    pub fn new(model: &TimingModel) -> Self {
        let mut graph = DiGraph::with_capacity(model.components().len(), model.connections().len());
        for idx in 0..model.components().len() {
            graph.add_node(idx);
        }
        for (cidx, conn) in model.connections().iter().enumerate() {
            graph.add_edge(
                NodeIndex::new(conn.source.component),
                NodeIndex::new(conn.target.component),
                cidx,
            );
        }
        Self { graph }
    }

    /// Shortest (fewest hops) connection path from `from` to `to`, as the
    /// list of connections traversed. `Some(vec![])` when `from == to`.
    /// Ties are broken by connection declaration order.
    pub fn path(&self, from: ComponentId, to: ComponentId) -> Option<Vec<ConnectionId>> {
        if from == to {
            return Some(Vec::new());
        }
        let n = self.graph.node_count();
        let mut via: Vec<Option<(ComponentId, ConnectionId)>> = vec![None; n];
        let mut seen = vec![false; n];
        let mut queue = VecDeque::new();
        seen[from] = true;
        queue.push_back(from);

        while let Some(cur) = queue.pop_front() {
            let mut edges: Vec<(ConnectionId, ComponentId)> = self
                .graph
                .edges(NodeIndex::new(cur))
                .map(|e| (*e.weight(), e.target().index()))
                .collect();
            edges.sort_unstable();
            for (conn, next) in edges {
                if seen[next] {
                    continue;
                }
                seen[next] = true;
                via[next] = Some((cur, conn));
                if next == to {
                    let mut path = Vec::new();
                    let mut at = to;
                    while let Some((prev, c)) = via[at] {
                        path.push(c);
                        at = prev;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }
        None
    }

    /// Connections along an explicit component chain (first matching
    /// connection per consecutive pair).
    pub fn chain(&self, chain: &[ComponentId]) -> Option<Vec<ConnectionId>> {
        chain
            .windows(2)
            .map(|pair| {
                self.graph
                    .edges_connecting(NodeIndex::new(pair[0]), NodeIndex::new(pair[1]))
                    .map(|e| *e.weight())
                    .min()
            })
            .collect()
    }
}
