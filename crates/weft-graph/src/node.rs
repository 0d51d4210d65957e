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

use std::fmt::{self, Display, Formatter};
use weft_kernel::RecordList;

/// Unique id of a node within one execution graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed classification of the node shapes the execution engine produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Atomic step with no nested scope.
    Atom,
    /// Opens a nested scope: a stage, a parallel branch, a step group.
    BlockStart,
    /// Opens a scope that acquires an execution resource. The acquisition
    /// span is attached to this node's parent, so the latency of getting
    /// the resource stays visible on the enclosing step.
    AllocationStart,
    /// Closes the scope opened by the paired start node, and delegates its
    /// span identity to it.
    BlockEnd { start: NodeId },
}

/// One node of the execution graph.
///
/// Nodes are created and linked by the execution engine as the run unfolds;
/// the span overlay only attaches monitoring records to them. Parents and
/// the enclosing-block chain are fixed at insertion.
#[derive(Debug)]
pub struct GraphNode {
    id: NodeId,
    name: String,
    kind: NodeKind,
    parents: Vec<NodeId>,
    enclosing: Vec<NodeId>,
    records: RecordList,
}

impl GraphNode {
    pub(crate) fn new(
        id: NodeId,
        name: String,
        kind: NodeKind,
        parents: Vec<NodeId>,
        enclosing: Vec<NodeId>,
    ) -> Self {
        Self {
            id,
            name,
            kind,
            parents,
            enclosing,
            records: RecordList::default(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Direct parents; more than one only at a join point.
    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }

    /// Enclosing block starts, nearest first, execution root last.
    pub fn enclosing_blocks(&self) -> &[NodeId] {
        &self.enclosing
    }

    /// Monitoring records attached to this node.
    pub fn records(&self) -> &RecordList {
        &self.records
    }
}

impl Display for GraphNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.id, self.name)
    }
}
