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

//! The execution-engine-facing data model: the graph of steps, blocks, and
//! parallel branches one job execution runs through, and the instance that
//! owns it. The span overlay reads this model and attaches monitoring
//! records to it; it never creates, deletes, or reparents nodes.

pub mod graph;
pub mod node;

pub use graph::{ExecutionGraph, ExecutionInstance, GraphError};
pub use node::{GraphNode, NodeId, NodeKind};
