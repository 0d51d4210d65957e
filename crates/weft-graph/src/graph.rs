// Copyright 2025 Weft Maintainers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::node::{GraphNode, NodeId, NodeKind};
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use weft_kernel::RecordList;

/// Engine misuse while growing the graph.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GraphError {
    #[error("unknown parent node {0}")]
    UnknownParent(NodeId),
    #[error("block end references unknown start node {0}")]
    UnknownBlockStart(NodeId),
    #[error("duplicate node id {0}")]
    DuplicateNode(NodeId),
}

/// Execution DAG of one instance, grown node by node as the run proceeds.
///
/// Parallel branches append concurrently; a node is never reshaped once it
/// is in. The enclosing-block chain of a node is derived once at append
/// time, which is sound because its parents are fixed at insertion.
#[derive(Debug, Default)]
pub struct ExecutionGraph {
    nodes: RwLock<HashMap<NodeId, Arc<GraphNode>>>,
    heads: RwLock<Vec<NodeId>>,
}

impl ExecutionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node. Parents must already be present; the first node has
    /// none and becomes the execution root.
    pub fn append(
        &self,
        id: u64,
        name: impl Into<String>,
        kind: NodeKind,
        parents: &[NodeId],
    ) -> Result<Arc<GraphNode>, GraphError> {
        let id = NodeId::new(id);
        let mut nodes = self.nodes.write();
        if nodes.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        for parent in parents {
            if !nodes.contains_key(parent) {
                return Err(GraphError::UnknownParent(*parent));
            }
        }
        let enclosing = Self::derive_enclosing(&nodes, kind, parents)?;
        let node = Arc::new(GraphNode::new(
            id,
            name.into(),
            kind,
            parents.to_vec(),
            enclosing,
        ));
        nodes.insert(id, Arc::clone(&node));

        let mut heads = self.heads.write();
        heads.retain(|head| !parents.contains(head));
        heads.push(id);

        Ok(node)
    }

    pub fn node(&self, id: NodeId) -> Option<Arc<GraphNode>> {
        self.nodes.read().get(&id).cloned()
    }

    /// Resolve a node's cached enclosing-block chain, nearest block first.
    pub fn enclosing_blocks(&self, node: &GraphNode) -> Vec<Arc<GraphNode>> {
        let nodes = self.nodes.read();
        node.enclosing_blocks()
            .iter()
            .filter_map(|id| nodes.get(id).cloned())
            .collect()
    }

    /// Not-yet-completed leaves: the current execution frontier.
    pub fn current_heads(&self) -> Vec<Arc<GraphNode>> {
        let head_ids = self.heads.read().clone();
        let nodes = self.nodes.read();
        head_ids
            .iter()
            .filter_map(|id| nodes.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    fn derive_enclosing(
        nodes: &HashMap<NodeId, Arc<GraphNode>>,
        kind: NodeKind,
        parents: &[NodeId],
    ) -> Result<Vec<NodeId>, GraphError> {
        // A block end sits in the same scopes as its start, not inside it.
        if let NodeKind::BlockEnd { start } = kind {
            let start = nodes
                .get(&start)
                .ok_or(GraphError::UnknownBlockStart(start))?;
            return Ok(start.enclosing_blocks().to_vec());
        }
        // Join nodes derive from their first parent: converging branches
        // share the enclosing block by construction.
        let Some(parent) = parents.first().and_then(|id| nodes.get(id)) else {
            return Ok(Vec::new());
        };
        match parent.kind() {
            NodeKind::BlockStart | NodeKind::AllocationStart => {
                let mut chain = Vec::with_capacity(parent.enclosing_blocks().len() + 1);
                chain.push(parent.id());
                chain.extend_from_slice(parent.enclosing_blocks());
                Ok(chain)
            }
            NodeKind::Atom | NodeKind::BlockEnd { .. } => Ok(parent.enclosing_blocks().to_vec()),
        }
    }
}

/// One run of a job, and everything the span overlay attaches to it.
///
/// Graph-based executions carry their DAG. Legacy linear builds carry none
/// and use the step record storage instead; their phase and root records
/// work the same either way.
#[derive(Debug)]
pub struct ExecutionInstance {
    name: String,
    root_records: RecordList,
    phase_records: RecordList,
    step_records: RecordList,
    graph: Option<ExecutionGraph>,
}

impl ExecutionInstance {
    /// A legacy linear build with no graph structure.
    pub fn linear(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root_records: RecordList::default(),
            phase_records: RecordList::default(),
            step_records: RecordList::default(),
            graph: None,
        }
    }

    /// A graph-based execution.
    pub fn with_graph(name: impl Into<String>, graph: ExecutionGraph) -> Self {
        Self {
            name: name.into(),
            root_records: RecordList::default(),
            phase_records: RecordList::default(),
            step_records: RecordList::default(),
            graph: Some(graph),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> Option<&ExecutionGraph> {
        self.graph.as_ref()
    }

    /// Records for the top-level execution span.
    pub fn root_records(&self) -> &RecordList {
        &self.root_records
    }

    /// Records for the phase spans, in attachment order.
    pub fn phase_records(&self) -> &RecordList {
        &self.phase_records
    }

    /// Records for the steps of a legacy linear build.
    pub fn step_records(&self) -> &RecordList {
        &self.step_records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(nodes: &[Arc<GraphNode>]) -> Vec<NodeId> {
        nodes.iter().map(|node| node.id()).collect()
    }

    /// The running example: an agent block with a resource allocation,
    /// a stage, and three parallel branches of one shell step each.
    fn parallel_pipeline() -> ExecutionGraph {
        let graph = ExecutionGraph::new();
        graph
            .append(2, "pipeline", NodeKind::BlockStart, &[])
            .unwrap();
        graph
            .append(3, "agent", NodeKind::BlockStart, &[NodeId::new(2)])
            .unwrap();
        graph
            .append(4, "agent.allocate", NodeKind::AllocationStart, &[NodeId::new(3)])
            .unwrap();
        graph
            .append(6, "stage", NodeKind::BlockStart, &[NodeId::new(4)])
            .unwrap();
        for (branch, step, label) in [(10, 14, "shell-1"), (11, 16, "shell-2"), (12, 18, "shell-3")]
        {
            graph
                .append(branch, format!("branch-{branch}"), NodeKind::BlockStart, &[
                    NodeId::new(6),
                ])
                .unwrap();
            graph
                .append(step, label, NodeKind::Atom, &[NodeId::new(branch)])
                .unwrap();
        }
        graph
    }

    #[test]
    fn enclosing_chain_walks_outward_to_the_root() {
        let graph = parallel_pipeline();
        let step = graph.node(NodeId::new(18)).unwrap();
        assert_eq!(
            step.enclosing_blocks(),
            &[
                NodeId::new(12),
                NodeId::new(6),
                NodeId::new(4),
                NodeId::new(3),
                NodeId::new(2)
            ]
        );
    }

    #[test]
    fn block_end_sits_beside_its_start_not_inside_it() {
        let graph = parallel_pipeline();
        let end = graph
            .append(15, "branch-1-end", NodeKind::BlockEnd { start: NodeId::new(10) }, &[
                NodeId::new(14),
            ])
            .unwrap();
        let start = graph.node(NodeId::new(10)).unwrap();
        assert_eq!(end.enclosing_blocks(), start.enclosing_blocks());
    }

    #[test]
    fn sibling_after_a_closed_block_leaves_its_scope() {
        let graph = parallel_pipeline();
        graph
            .append(15, "branch-1-end", NodeKind::BlockEnd { start: NodeId::new(10) }, &[
                NodeId::new(14),
            ])
            .unwrap();
        let next = graph
            .append(20, "cleanup", NodeKind::Atom, &[NodeId::new(15)])
            .unwrap();
        assert_eq!(
            next.enclosing_blocks(),
            &[
                NodeId::new(6),
                NodeId::new(4),
                NodeId::new(3),
                NodeId::new(2)
            ]
        );
    }

    #[test]
    fn frontier_tracks_unfinished_parallel_branches() {
        let graph = parallel_pipeline();
        assert_eq!(
            ids(&graph.current_heads()),
            vec![NodeId::new(14), NodeId::new(16), NodeId::new(18)]
        );

        // Joining the branches collapses the frontier to the join node.
        graph
            .append(
                21,
                "join",
                NodeKind::BlockEnd { start: NodeId::new(6) },
                &[NodeId::new(14), NodeId::new(16), NodeId::new(18)],
            )
            .unwrap();
        assert_eq!(ids(&graph.current_heads()), vec![NodeId::new(21)]);
    }

    #[test]
    fn appending_under_an_unknown_parent_is_rejected() {
        let graph = ExecutionGraph::new();
        let err = graph
            .append(5, "step", NodeKind::Atom, &[NodeId::new(4)])
            .unwrap_err();
        assert_eq!(err, GraphError::UnknownParent(NodeId::new(4)));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let graph = parallel_pipeline();
        let err = graph
            .append(6, "stage-again", NodeKind::BlockStart, &[NodeId::new(4)])
            .unwrap_err();
        assert_eq!(err, GraphError::DuplicateNode(NodeId::new(6)));
    }

    #[test]
    fn block_end_without_its_start_is_rejected() {
        let graph = parallel_pipeline();
        let err = graph
            .append(30, "stray-end", NodeKind::BlockEnd { start: NodeId::new(99) }, &[
                NodeId::new(14),
            ])
            .unwrap_err();
        assert_eq!(err, GraphError::UnknownBlockStart(NodeId::new(99)));
    }
}
