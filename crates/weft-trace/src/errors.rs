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

use opentelemetry::trace::SpanId;
use thiserror::Error;
use weft_graph::{NodeId, NodeKind};

/// Protocol violations surfaced by span removal.
///
/// Lookups never fail: a miss resolves to the no-op span. A removal that
/// cannot find its record, however, means the attach/remove protocol was
/// broken by the caller, and is reported instead of silently ignored.
/// Failed removals leave no partial state behind.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TraceError {
    #[error("no record matching span {span_id} to purge on {target}")]
    RecordNotFound { span_id: SpanId, target: String },
    #[error("cannot remove a span from {kind:?} node {id}")]
    UnsupportedNodeKind { id: NodeId, kind: NodeKind },
    #[error("allocation node {0} has no parent")]
    MissingParent(NodeId),
    #[error("node {0} is not part of this execution")]
    UnknownNode(NodeId),
}
