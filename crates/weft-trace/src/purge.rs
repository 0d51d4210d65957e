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
use std::collections::HashSet;
use tracing::trace;
use weft_graph::{ExecutionGraph, NodeId};

/// Purge the records of every node reachable from the execution frontier.
///
/// Walks backward through parent links from the current heads, so leaves
/// still executing in parallel branches are covered, and visits each node
/// once even where branches converge on a join.
pub fn purge_reachable(graph: &ExecutionGraph) {
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut worklist = graph.current_heads();
    while let Some(node) = worklist.pop() {
        if !visited.insert(node.id()) {
            continue;
        }
        node.records().purge_all();
        for parent in node.parents() {
            if !visited.contains(parent) {
                if let Some(parent) = graph.node(*parent) {
                    worklist.push(parent);
                }
            }
        }
    }
    trace!(target: EVENT_TARGET, nodes = visited.len(), "graph records purged");
}
