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

//! Monitoring records: the per-target bookkeeping that binds a span handle
//! to the node, phase, or build step it annotates.

use crate::span::{self, SpanHandle};
use opentelemetry::trace::SpanId;
use parking_lot::RwLock;
use std::{
    fmt::{self, Display, Formatter},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

/// The three coarse stages of an execution instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Start,
    Run,
    Finalize,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Start => "Start",
            Phase::Run => "Run",
            Phase::Finalize => "Finalize",
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a monitoring record annotates. Diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// The top-level span of the whole execution.
    Root,
    /// One of the phase spans of the execution.
    Phase,
    /// A span on one graph node.
    Node,
    /// A span on one step of a legacy linear build.
    Step,
}

/// Binds one span handle to the target it annotates.
///
/// The span identity is immutable once attached. A record moves through
/// `attached → ended → purged`, or straight to purged on forced termination;
/// purged is terminal, and purging again is a no-op. Purged records stay in
/// their list for duration accounting, but never resolve as active again.
#[derive(Debug)]
pub struct MonitoringRecord {
    kind: RecordKind,
    phase: Option<Phase>,
    span: Arc<dyn SpanHandle>,
    purged: AtomicBool,
}

impl MonitoringRecord {
    pub fn new(kind: RecordKind, span: Arc<dyn SpanHandle>) -> Self {
        Self {
            kind,
            phase: None,
            span,
            purged: AtomicBool::new(false),
        }
    }

    pub fn for_phase(phase: Phase, span: Arc<dyn SpanHandle>) -> Self {
        Self {
            kind: RecordKind::Phase,
            phase: Some(phase),
            span,
            purged: AtomicBool::new(false),
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    /// Identity of the attached span, readable even after purge.
    pub fn span_id(&self) -> SpanId {
        self.span.span_id()
    }

    /// The attached span, or the no-op handle once purged.
    pub fn span(&self) -> Arc<dyn SpanHandle> {
        if self.is_purged() {
            span::invalid()
        } else {
            Arc::clone(&self.span)
        }
    }

    pub fn is_purged(&self) -> bool {
        self.purged.load(Ordering::Acquire)
    }

    /// True once the span ended or the record was purged.
    pub fn has_ended(&self) -> bool {
        self.is_purged() || self.span.has_ended()
    }

    /// Mark the span as no longer resolvable. Idempotent.
    pub fn purge(&self) {
        self.purged.store(true, Ordering::Release);
    }
}

/// Append-only, thread-safe sequence of records owned by one target.
///
/// Appends preserve order and readers observe a consistent prefix, so
/// "most recently attached" is well-defined under concurrent writers from
/// parallel branches. Records enter through [`RecordList::append`] and only
/// ever change state through [`MonitoringRecord::purge`]; there is no raw
/// list mutation.
#[derive(Debug, Default)]
pub struct RecordList {
    records: RwLock<Vec<Arc<MonitoringRecord>>>,
}

impl RecordList {
    pub fn append(&self, record: MonitoringRecord) -> Arc<MonitoringRecord> {
        let record = Arc::new(record);
        self.records.write().push(Arc::clone(&record));
        record
    }

    /// Records in attachment order.
    pub fn snapshot(&self) -> Vec<Arc<MonitoringRecord>> {
        self.records.read().clone()
    }

    /// Most recently attached record whose span has not ended.
    pub fn most_recent_active(&self) -> Option<Arc<MonitoringRecord>> {
        self.records
            .read()
            .iter()
            .rev()
            .find(|record| !record.has_ended())
            .cloned()
    }

    /// Earliest attached record, ended or not.
    pub fn first(&self) -> Option<Arc<MonitoringRecord>> {
        self.records.read().first().cloned()
    }

    /// Most recently attached record, ended or not.
    pub fn last(&self) -> Option<Arc<MonitoringRecord>> {
        self.records.read().last().cloned()
    }

    /// Newest record bound to the given span id, purged ones included, so
    /// that re-removal of an already purged span stays idempotent.
    pub fn find_by_span_id(&self, span_id: SpanId) -> Option<Arc<MonitoringRecord>> {
        self.records
            .read()
            .iter()
            .rev()
            .find(|record| record.span_id() == span_id)
            .cloned()
    }

    /// True if any record is still active.
    pub fn has_active(&self) -> bool {
        self.records.read().iter().any(|record| !record.has_ended())
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Purge every record. Idempotent.
    pub fn purge_all(&self) {
        for record in self.records.read().iter() {
            record.purge();
        }
    }
}
