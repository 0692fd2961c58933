//! Allocation Graph Construction
//!
//! The allocation graph is a derived view: [`GraphBuilder::build`] produces a
//! fresh [`AdjacencyMatrix`] from a ledger snapshot and keeps no reference
//! into the ledger, so a stale graph can never be observed through it.
//!
//! ```text
//! Resource(j) ──holds──▶ Process(i)     iff allocated[i][j] > 0
//! Process(i)  ──waits──▶ Resource(j)    iff requested[i][j] > 0
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ledger::ResourceLedger;
use super::types::{GraphNode, ProcessId, ResourceId, Units};

/// Dense directed adjacency matrix over `size` nodes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdjacencyMatrix {
    size: usize,
    /// Row-major `size * size` cells
    cells: Vec<bool>,
}

impl AdjacencyMatrix {
    /// Create an edgeless matrix
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![false; size * size],
        }
    }

    /// Number of nodes
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Check for an edge `from -> to` (false when out of range)
    #[inline]
    pub fn has_edge(&self, from: usize, to: usize) -> bool {
        from < self.size && to < self.size && self.cells[from * self.size + to]
    }

    /// Insert `from -> to`; returns false when an index is out of range
    pub fn add_edge(&mut self, from: usize, to: usize) -> bool {
        if from >= self.size || to >= self.size {
            return false;
        }
        self.cells[from * self.size + to] = true;
        true
    }

    /// Remove `from -> to` if present
    pub fn remove_edge(&mut self, from: usize, to: usize) {
        if from < self.size && to < self.size {
            self.cells[from * self.size + to] = false;
        }
    }

    /// Remove every edge into and out of `node`
    pub fn isolate(&mut self, node: usize) {
        if node >= self.size {
            return;
        }
        for other in 0..self.size {
            self.cells[node * self.size + other] = false;
            self.cells[other * self.size + node] = false;
        }
    }

    /// First successor of `node` with index `>= from`, in index order
    #[inline]
    pub fn next_successor(&self, node: usize, from: usize) -> Option<usize> {
        if node >= self.size || from >= self.size {
            return None;
        }
        let row = &self.cells[node * self.size..(node + 1) * self.size];
        row[from..].iter().position(|&edge| edge).map(|offset| from + offset)
    }

    /// Successors of `node` in index order
    pub fn successors(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        let mut cursor = 0;
        std::iter::from_fn(move || {
            let next = self.next_successor(node, cursor)?;
            cursor = next + 1;
            Some(next)
        })
    }

    /// Total number of edges
    pub fn edge_count(&self) -> usize {
        self.cells.iter().filter(|&&edge| edge).count()
    }
}

/// Direction/meaning of an allocation-graph edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// `Resource -> Process`: instances are held
    Holds,
    /// `Process -> Resource`: instances are requested
    WaitsFor,
}

/// One labelled edge of the allocation graph, for renderers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Source node
    pub from: GraphNode,
    /// Target node
    pub to: GraphNode,
    /// Edge meaning
    pub kind: EdgeKind,
    /// Units held or requested
    pub units: Units,
}

/// Derives the allocation graph from ledger state
///
/// Pure functions only; the builder holds no state between calls.
pub struct GraphBuilder;

impl GraphBuilder {
    /// Build the `(P + R) x (P + R)` adjacency matrix for `ledger`
    pub fn build(ledger: &ResourceLedger) -> AdjacencyMatrix {
        let p_count = ledger.num_processes();
        let r_count = ledger.num_resources();
        let mut matrix = AdjacencyMatrix::new(p_count + r_count);

        for i in 0..p_count {
            for j in 0..r_count {
                let (process, resource) = (ProcessId(i), ResourceId(j));
                if ledger.allocated(process, resource) > 0 {
                    matrix.add_edge(p_count + j, i);
                }
                if ledger.requested(process, resource) > 0 {
                    matrix.add_edge(i, p_count + j);
                }
            }
        }

        debug!(
            "graph: rebuilt {} nodes, {} edges",
            matrix.size(),
            matrix.edge_count()
        );
        matrix
    }

    /// List every edge with its unit count
    ///
    /// Process-major, resource-minor; for each pair the request edge comes
    /// before the hold edge.
    pub fn edges(ledger: &ResourceLedger) -> Vec<GraphEdge> {
        let mut edges = Vec::new();

        for i in 0..ledger.num_processes() {
            for j in 0..ledger.num_resources() {
                let (process, resource) = (ProcessId(i), ResourceId(j));

                let requested = ledger.requested(process, resource);
                if requested > 0 {
                    edges.push(GraphEdge {
                        from: GraphNode::Process(process),
                        to: GraphNode::Resource(resource),
                        kind: EdgeKind::WaitsFor,
                        units: requested,
                    });
                }

                let held = ledger.allocated(process, resource);
                if held > 0 {
                    edges.push(GraphEdge {
                        from: GraphNode::Resource(resource),
                        to: GraphNode::Process(process),
                        kind: EdgeKind::Holds,
                        units: held,
                    });
                }
            }
        }

        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_a() -> ResourceLedger {
        ResourceLedger::new(
            2,
            2,
            vec![1, 1],
            vec![0, 0],
            vec![vec![1, 0], vec![0, 1]],
            vec![vec![0, 1], vec![1, 0]],
        )
        .unwrap()
    }

    #[test]
    fn test_build_places_hold_and_request_edges() {
        let matrix = GraphBuilder::build(&scenario_a());

        assert_eq!(matrix.size(), 4);
        assert_eq!(matrix.edge_count(), 4);
        // R0 -> P0, R1 -> P1
        assert!(matrix.has_edge(2, 0));
        assert!(matrix.has_edge(3, 1));
        // P0 -> R1, P1 -> R0
        assert!(matrix.has_edge(0, 3));
        assert!(matrix.has_edge(1, 2));
        assert!(!matrix.has_edge(0, 2));
    }

    #[test]
    fn test_build_is_deterministic() {
        let ledger = scenario_a();
        assert_eq!(GraphBuilder::build(&ledger), GraphBuilder::build(&ledger));
    }

    #[test]
    fn test_edges_are_labelled() {
        let edges = GraphBuilder::edges(&scenario_a());

        assert_eq!(edges.len(), 4);
        assert_eq!(
            edges[0],
            GraphEdge {
                from: GraphNode::Resource(ResourceId(0)),
                to: GraphNode::Process(ProcessId(0)),
                kind: EdgeKind::Holds,
                units: 1,
            }
        );
        assert_eq!(edges[1].kind, EdgeKind::WaitsFor);
        assert_eq!(edges[1].to, GraphNode::Resource(ResourceId(1)));
    }

    #[test]
    fn test_successors_in_index_order() {
        let mut matrix = AdjacencyMatrix::new(4);
        matrix.add_edge(0, 3);
        matrix.add_edge(0, 1);
        assert_eq!(matrix.successors(0).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(matrix.next_successor(0, 2), Some(3));
        assert_eq!(matrix.next_successor(0, 4), None);
    }

    #[test]
    fn test_isolate_drops_incident_edges() {
        let mut matrix = AdjacencyMatrix::new(3);
        matrix.add_edge(0, 1);
        matrix.add_edge(1, 2);
        matrix.add_edge(2, 0);

        matrix.isolate(1);

        assert_eq!(matrix.edge_count(), 1);
        assert!(matrix.has_edge(2, 0));
    }

    #[test]
    fn test_out_of_range_edge_is_ignored() {
        let mut matrix = AdjacencyMatrix::new(2);
        assert!(!matrix.add_edge(0, 2));
        assert_eq!(matrix.edge_count(), 0);
    }
}
