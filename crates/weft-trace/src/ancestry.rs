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

use crate::EVENT_TARGET;
use std::sync::Arc;
use tracing::trace;
use weft_graph::{ExecutionGraph, GraphNode, NodeKind};

/// Chain of enclosing nodes for `node`: itself first, execution root last.
///
/// A block-end marker shares the logical span lifetime of its paired start,
/// so the walk starts from the start node instead. From there the chain is
/// the node followed by its enclosing blocks outward, not the raw parent
/// edges, which would stop at sibling and parallel structure instead of
/// reaching the lexically enclosing scopes.
///
/// For a stage of three parallel branches,
///
/// ```text
/// pipeline (2)
/// └── agent (3)
///     └── agent.allocate (4)
///         └── stage (6)
///             ├── branch-1 (10) ── shell-1 (14)
///             ├── branch-2 (11) ── shell-2 (16)
///             └── branch-3 (12) ── shell-3 (18)
/// ```
///
/// the chain of `shell-3` is `[18, 12, 6, 4, 3, 2]`: the step, its branch,
/// the stage, and the agent scopes, never the sibling branches.
///
/// Pure read over already-materialized links: safe to call while the graph
/// is still growing, and deterministic on an unchanged graph.
pub fn ancestors(graph: &ExecutionGraph, node: &Arc<GraphNode>) -> Vec<Arc<GraphNode>> {
    let start = match node.kind() {
        NodeKind::BlockEnd { start } => graph.node(start).unwrap_or_else(|| Arc::clone(node)),
        NodeKind::Atom | NodeKind::BlockStart | NodeKind::AllocationStart => Arc::clone(node),
    };
    let mut chain = Vec::with_capacity(1 + start.enclosing_blocks().len());
    chain.push(Arc::clone(&start));
    chain.extend(graph.enclosing_blocks(&start));
    trace!(target: EVENT_TARGET, node = %node, depth = chain.len(), "ancestors resolved");
    chain
}
