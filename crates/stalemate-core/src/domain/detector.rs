//! CycleDetector - Deadlock Decision Procedure
//!
//! # Algorithm
//!
//! Depth-first search with three-color marking:
//!
//! ```text
//! Unvisited ──push──▶ OnStack ──all successors explored──▶ Done
//! ```
//!
//! An edge into an `OnStack` node is a back-edge and closes a cycle. The
//! reported path runs from that node (inclusive) to the node currently on
//! top of the stack, in visitation order.
//!
//! The recursion is an explicit stack of `(node, cursor)` frames, where the
//! cursor is the next column of the node's adjacency row to inspect. Roots
//! and successors are both scanned in index order, so identical input always
//! yields the identical cycle. Only the first cycle found is reported.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::graph::AdjacencyMatrix;
use super::types::{GraphNode, ProcessId, ResourceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    node: usize,
    cursor: usize,
}

/// Evidence of deadlock: an ordered closed walk through the graph
///
/// `path[0]` is the node the back-edge returns to, so `closing == path[0]`
/// and the walk `path[0] -> path[1] -> ... -> path[n-1] -> closing` uses
/// only edges of the graph it was detected in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleRecord {
    path: Vec<usize>,
    closing: usize,
    num_processes: usize,
    node_count: usize,
}

impl CycleRecord {
    /// Raw node indices of the cycle in visitation order
    pub fn path(&self) -> &[usize] {
        &self.path
    }

    /// Raw index of the node the back-edge closes on
    pub fn closing(&self) -> usize {
        self.closing
    }

    /// Number of process nodes in the graph the record came from
    pub fn num_processes(&self) -> usize {
        self.num_processes
    }

    /// Node count of the graph the record came from
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Number of nodes on the cycle
    pub fn len(&self) -> usize {
        self.path.len()
    }

    /// Always false for records produced by the detector
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// Cycle nodes as typed process/resource nodes
    pub fn nodes(&self) -> Vec<GraphNode> {
        self.path
            .iter()
            .map(|&n| GraphNode::from_index(n, self.num_processes))
            .collect()
    }

    /// Distinct processes on the cycle, ascending
    pub fn processes(&self) -> Vec<ProcessId> {
        self.path
            .iter()
            .filter(|&&n| n < self.num_processes)
            .map(|&n| ProcessId(n))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct resource types on the cycle, ascending
    pub fn resources(&self) -> Vec<ResourceId> {
        self.path
            .iter()
            .filter(|&&n| n >= self.num_processes)
            .map(|&n| ResourceId(n - self.num_processes))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Every edge of the closed walk, including `last -> closing`
    pub fn edges(&self) -> Vec<(usize, usize)> {
        let mut edges: Vec<(usize, usize)> = self.path.windows(2).map(|w| (w[0], w[1])).collect();
        if let Some(&last) = self.path.last() {
            edges.push((last, self.closing));
        }
        edges
    }
}

impl fmt::Display for CycleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in self.nodes() {
            write!(f, "{node} -> ")?;
        }
        write!(f, "{}", GraphNode::from_index(self.closing, self.num_processes))
    }
}

/// Cycle finder over an [`AdjacencyMatrix`]
pub struct CycleDetector;

impl CycleDetector {
    /// Find the first cycle of `adjacency`
    ///
    /// Node indices below `num_processes` are reported as processes, the
    /// rest as resources. Pass `adjacency.size()` for a wait-for graph.
    pub fn detect(adjacency: &AdjacencyMatrix, num_processes: usize) -> Option<CycleRecord> {
        let node_count = adjacency.size();
        let mut marks = vec![Mark::Unvisited; node_count];
        let mut stack: Vec<Frame> = Vec::new();

        for root in 0..node_count {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            marks[root] = Mark::OnStack;
            stack.push(Frame { node: root, cursor: 0 });

            while let Some(frame) = stack.last_mut() {
                let node = frame.node;
                let Some(next) = adjacency.next_successor(node, frame.cursor) else {
                    marks[node] = Mark::Done;
                    stack.pop();
                    continue;
                };
                frame.cursor = next + 1;

                match marks[next] {
                    Mark::Unvisited => {
                        marks[next] = Mark::OnStack;
                        stack.push(Frame { node: next, cursor: 0 });
                    }
                    Mark::OnStack => {
                        // every OnStack node has a frame
                        let start = stack.iter().position(|f| f.node == next)?;
                        return Some(CycleRecord {
                            path: stack[start..].iter().map(|f| f.node).collect(),
                            closing: next,
                            num_processes: num_processes.min(node_count),
                            node_count,
                        });
                    }
                    Mark::Done => {}
                }
            }
        }

        None
    }

    /// Check a record against a graph: every walk edge must be present
    pub fn is_closed_walk(record: &CycleRecord, adjacency: &AdjacencyMatrix) -> bool {
        !record.is_empty()
            && record.path.first() == Some(&record.closing)
            && record
                .edges()
                .iter()
                .all(|&(from, to)| adjacency.has_edge(from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(size: usize, edges: &[(usize, usize)]) -> AdjacencyMatrix {
        let mut matrix = AdjacencyMatrix::new(size);
        for &(from, to) in edges {
            matrix.add_edge(from, to);
        }
        matrix
    }

    #[test]
    fn test_acyclic_graph_has_no_cycle() {
        let matrix = graph(3, &[(0, 1), (1, 2), (0, 2)]);
        assert_eq!(CycleDetector::detect(&matrix, 3), None);
    }

    #[test]
    fn test_three_ring() {
        let matrix = graph(3, &[(0, 1), (1, 2), (2, 0)]);
        let record = CycleDetector::detect(&matrix, 3).unwrap();

        assert_eq!(record.path(), &[0, 1, 2]);
        assert_eq!(record.closing(), 0);
        assert!(CycleDetector::is_closed_walk(&record, &matrix));
    }

    #[test]
    fn test_path_starts_at_back_edge_target() {
        // 0 -> 1 -> 2 -> 3 -> 1 ; node 0 is a tail, not part of the cycle
        let matrix = graph(4, &[(0, 1), (1, 2), (2, 3), (3, 1)]);
        let record = CycleDetector::detect(&matrix, 4).unwrap();

        assert_eq!(record.path(), &[1, 2, 3]);
        assert_eq!(record.closing(), 1);
    }

    #[test]
    fn test_self_loop() {
        let matrix = graph(2, &[(1, 1)]);
        let record = CycleDetector::detect(&matrix, 2).unwrap();

        assert_eq!(record.path(), &[1]);
        assert_eq!(record.edges(), vec![(1, 1)]);
    }

    #[test]
    fn test_explored_nodes_are_not_rescanned_as_cycles() {
        // Diamond 0->1, 0->2, 1->3, 2->3: 3 is Done when reached again
        let matrix = graph(4, &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        assert!(CycleDetector::detect(&matrix, 4).is_none());
    }

    #[test]
    fn test_later_root_finds_cycle() {
        let matrix = graph(5, &[(0, 1), (3, 4), (4, 3)]);
        let record = CycleDetector::detect(&matrix, 5).unwrap();
        assert_eq!(record.path(), &[3, 4]);
    }

    #[test]
    fn test_bipartite_labels() {
        // P0 -> R1 -> P1 -> R0 -> P0 with P = 2
        let matrix = graph(4, &[(2, 0), (3, 1), (0, 3), (1, 2)]);
        let record = CycleDetector::detect(&matrix, 2).unwrap();

        assert_eq!(record.to_string(), "P0 -> R1 -> P1 -> R0 -> P0");
        assert_eq!(record.processes(), vec![ProcessId(0), ProcessId(1)]);
        assert_eq!(record.resources(), vec![ResourceId(0), ResourceId(1)]);
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let n = 2_000;
        let mut matrix = AdjacencyMatrix::new(n);
        for i in 0..n - 1 {
            matrix.add_edge(i, i + 1);
        }
        matrix.add_edge(n - 1, 0);

        let record = CycleDetector::detect(&matrix, n).unwrap();
        assert_eq!(record.len(), n);
    }
}
