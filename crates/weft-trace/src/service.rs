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

use crate::{EVENT_TARGET, TraceError, ancestry, purge};
use opentelemetry::ContextGuard;
use std::sync::Arc;
use tracing::{debug, trace};
use weft_graph::{ExecutionInstance, GraphNode, NodeKind};
use weft_kernel::{MonitoringRecord, Phase, RecordKind, SpanHandle, invalid};

/// Facade through which the execution engine attaches, resolves, and
/// removes spans.
///
/// Stateless: every record lives on the node or instance it annotates, so
/// the service can be shared freely across parallel branches.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraceService;

impl TraceService {
    pub fn new() -> Self {
        Self
    }

    /// Span of the current execution phase: the most recently attached
    /// phase record, or the no-op handle if none survives (fresh process,
    /// purged instance).
    pub fn phase_span(&self, run: &ExecutionInstance) -> Arc<dyn SpanHandle> {
        run.phase_records()
            .last()
            .map(|record| record.span())
            .unwrap_or_else(invalid)
    }

    /// Top-level span of the whole execution.
    pub fn root_span(&self, run: &ExecutionInstance) -> Arc<dyn SpanHandle> {
        run.root_records()
            .first()
            .map(|record| record.span())
            .unwrap_or_else(invalid)
    }

    /// Active span for a graph node.
    ///
    /// Walks the ancestor chain and returns the most recently attached
    /// record that is still active; when every enclosing span has already
    /// closed, falls back to the phase span. Callers always get a usable
    /// handle: availability over precision.
    pub fn node_span(
        &self,
        run: &ExecutionInstance,
        node: &Arc<GraphNode>,
    ) -> Arc<dyn SpanHandle> {
        if let Some(graph) = run.graph() {
            for ancestor in ancestry::ancestors(graph, node) {
                if let Some(record) = ancestor.records().most_recent_active() {
                    trace!(
                        target: EVENT_TARGET,
                        node = %node,
                        ancestor = %ancestor,
                        span_id = %record.span_id(),
                        "span resolved"
                    );
                    return record.span();
                }
            }
        }
        self.phase_span(run)
    }

    /// Active span for a step of a legacy linear build: the most recent
    /// non-ended step record, else the build's phase span.
    pub fn step_span(&self, build: &ExecutionInstance, step: &str) -> Arc<dyn SpanHandle> {
        trace!(target: EVENT_TARGET, build = %build.name(), step, "resolving step span");
        build
            .step_records()
            .most_recent_active()
            .map(|record| record.span())
            .unwrap_or_else(|| self.phase_span(build))
    }

    /// Attach the top-level span of the execution.
    pub fn put_root_span(&self, run: &ExecutionInstance, span: Arc<dyn SpanHandle>) {
        trace!(target: EVENT_TARGET, run = %run.name(), span_id = %span.span_id(), "attaching root span");
        run.root_records()
            .append(MonitoringRecord::new(RecordKind::Root, span));
    }

    /// Attach the span of a phase; lookups prefer it to earlier records.
    pub fn put_phase_span(&self, run: &ExecutionInstance, phase: Phase, span: Arc<dyn SpanHandle>) {
        trace!(target: EVENT_TARGET, run = %run.name(), %phase, span_id = %span.span_id(), "attaching phase span");
        run.phase_records()
            .append(MonitoringRecord::for_phase(phase, span));
    }

    /// Attach a span to a graph node.
    ///
    /// A node that already carries an active record keeps it: some targets
    /// hold two concurrent spans on purpose (a resource-allocation span
    /// layered onto the step it serves), so this is a diagnostic, not an
    /// error.
    pub fn put_node_span(
        &self,
        run: &ExecutionInstance,
        node: &Arc<GraphNode>,
        span: Arc<dyn SpanHandle>,
    ) {
        let span_id = span.span_id();
        if node.records().has_active() {
            debug!(
                target: EVENT_TARGET,
                node = %node,
                %span_id,
                "node already carries an active span"
            );
        }
        node.records()
            .append(MonitoringRecord::new(RecordKind::Node, span));
        debug!(target: EVENT_TARGET, run = %run.name(), node = %node, %span_id, "span attached");
    }

    /// Attach a span to a step of a legacy linear build.
    pub fn put_step_span(&self, build: &ExecutionInstance, step: &str, span: Arc<dyn SpanHandle>) {
        trace!(target: EVENT_TARGET, build = %build.name(), step, span_id = %span.span_id(), "attaching step span");
        build
            .step_records()
            .append(MonitoringRecord::new(RecordKind::Step, span));
    }

    /// Remove a span previously attached around a graph node.
    ///
    /// The record actually holding the span depends on the node shape: an
    /// atomic step holds its own, a block end delegates to its paired
    /// start, and a resource-allocation start delegates to its parent,
    /// where the acquisition span was attached. Any other shape is a
    /// protocol violation, as is a span that was never attached there.
    pub fn remove_node_span(
        &self,
        run: &ExecutionInstance,
        node: &Arc<GraphNode>,
        span: &dyn SpanHandle,
    ) -> Result<(), TraceError> {
        let target = Self::removal_target(run, node)?;
        let span_id = span.span_id();
        match target.records().find_by_span_id(span_id) {
            Some(record) => {
                record.purge();
                trace!(target: EVENT_TARGET, node = %node, resolved = %target, %span_id, "span removed");
                Ok(())
            }
            None => Err(TraceError::RecordNotFound {
                span_id,
                target: target.to_string(),
            }),
        }
    }

    /// Remove a span previously attached to a legacy build step.
    pub fn remove_step_span(
        &self,
        build: &ExecutionInstance,
        step: &str,
        span: &dyn SpanHandle,
    ) -> Result<(), TraceError> {
        let span_id = span.span_id();
        match build.step_records().find_by_span_id(span_id) {
            Some(record) => {
                record.purge();
                trace!(target: EVENT_TARGET, build = %build.name(), step, %span_id, "step span removed");
                Ok(())
            }
            None => Err(TraceError::RecordNotFound {
                span_id,
                target: format!("step {step} of {}", build.name()),
            }),
        }
    }

    /// Phase spans are only ever released by purging the whole instance;
    /// individual removal is deliberately a no-op.
    pub fn remove_phase_span(&self, _run: &ExecutionInstance, _span: &dyn SpanHandle) {}

    /// Purge every record of the instance: root, phase, legacy steps, then
    /// the full reachable graph. Idempotent and total; called on
    /// termination, or when reconciling a reloaded execution whose spans
    /// did not survive the restart.
    pub fn purge(&self, run: &ExecutionInstance) {
        debug!(target: EVENT_TARGET, run = %run.name(), "purging instance");
        run.root_records().purge_all();
        run.phase_records().purge_all();
        run.step_records().purge_all();
        if let Some(graph) = run.graph() {
            purge::purge_reachable(graph);
        }
    }

    /// Activate the instance's phase span as the ambient context.
    ///
    /// When nothing resolves (fresh process, purged instance) the empty
    /// context is attached instead, so the caller always holds a
    /// releasable scope.
    #[must_use = "dropping the guard immediately restores the previous context"]
    pub fn enter_scope(&self, run: &ExecutionInstance) -> ContextGuard {
        self.phase_span(run).context().attach()
    }

    fn removal_target(
        run: &ExecutionInstance,
        node: &Arc<GraphNode>,
    ) -> Result<Arc<GraphNode>, TraceError> {
        let graph = run.graph().ok_or(TraceError::UnknownNode(node.id()))?;
        match node.kind() {
            NodeKind::Atom => Ok(Arc::clone(node)),
            NodeKind::BlockEnd { start } => {
                graph.node(start).ok_or(TraceError::UnknownNode(start))
            }
            NodeKind::AllocationStart => {
                let parent = node
                    .parents()
                    .first()
                    .copied()
                    .ok_or(TraceError::MissingParent(node.id()))?;
                graph.node(parent).ok_or(TraceError::UnknownNode(parent))
            }
            NodeKind::BlockStart => Err(TraceError::UnsupportedNodeKind {
                id: node.id(),
                kind: node.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::SpanId;
    use weft_graph::{ExecutionGraph, NodeId};
    use weft_kernel::span::mock::MockSpan;

    fn handle(span: &MockSpan) -> Arc<dyn SpanHandle> {
        Arc::new(span.clone())
    }

    /// A stage enclosing one atomic step, with its end marker.
    fn staged_instance() -> ExecutionInstance {
        let graph = ExecutionGraph::new();
        graph.append(1, "root", NodeKind::BlockStart, &[]).unwrap();
        graph
            .append(2, "stage", NodeKind::BlockStart, &[NodeId::new(1)])
            .unwrap();
        graph
            .append(3, "step", NodeKind::Atom, &[NodeId::new(2)])
            .unwrap();
        graph
            .append(4, "stage-end", NodeKind::BlockEnd { start: NodeId::new(2) }, &[
                NodeId::new(3),
            ])
            .unwrap();
        ExecutionInstance::with_graph("job #7", graph)
    }

    fn node(run: &ExecutionInstance, id: u64) -> Arc<GraphNode> {
        run.graph().unwrap().node(NodeId::new(id)).unwrap()
    }

    #[test]
    fn a_bare_node_resolves_to_the_phase_span() {
        let service = TraceService::new();
        let run = staged_instance();
        let phase = MockSpan::new(100);
        service.put_phase_span(&run, Phase::Run, handle(&phase));

        let resolved = service.node_span(&run, &node(&run, 3));
        assert_eq!(resolved.span_id(), phase.span_id());
    }

    #[test]
    fn an_attached_span_resolves_immediately() {
        let service = TraceService::new();
        let run = staged_instance();
        let span = MockSpan::new(3);
        let step = node(&run, 3);
        service.put_node_span(&run, &step, handle(&span));

        assert_eq!(service.node_span(&run, &step).span_id(), span.span_id());
    }

    #[test]
    fn reattachment_wins_until_its_span_closes() {
        let service = TraceService::new();
        let run = staged_instance();
        let step = node(&run, 3);
        let first = MockSpan::new(31);
        let second = MockSpan::new(32);
        service.put_node_span(&run, &step, handle(&first));
        service.put_node_span(&run, &step, handle(&second));

        assert_eq!(service.node_span(&run, &step).span_id(), second.span_id());

        // The superseded record stays discoverable for accounting.
        assert_eq!(step.records().snapshot().len(), 2);

        second.end();
        assert_eq!(service.node_span(&run, &step).span_id(), first.span_id());
    }

    #[test]
    fn a_step_inherits_its_enclosing_block_span() {
        let service = TraceService::new();
        let run = staged_instance();
        let stage_span = MockSpan::new(2);
        service.put_node_span(&run, &node(&run, 2), handle(&stage_span));

        let resolved = service.node_span(&run, &node(&run, 3));
        assert_eq!(resolved.span_id(), stage_span.span_id());
    }

    #[test]
    fn the_root_span_is_the_first_one_attached() {
        let service = TraceService::new();
        let run = staged_instance();
        let first = MockSpan::new(11);
        let second = MockSpan::new(12);
        service.put_root_span(&run, handle(&first));
        service.put_root_span(&run, handle(&second));

        assert_eq!(service.root_span(&run).span_id(), first.span_id());
    }

    #[test]
    fn lookups_never_fail_on_an_empty_instance() {
        let service = TraceService::new();
        let run = ExecutionInstance::linear("job #1");

        assert_eq!(service.phase_span(&run).span_id(), SpanId::INVALID);
        assert_eq!(service.root_span(&run).span_id(), SpanId::INVALID);
        assert_eq!(service.step_span(&run, "compile").span_id(), SpanId::INVALID);
    }

    #[test]
    fn removal_of_a_block_end_purges_the_paired_start() {
        let service = TraceService::new();
        let run = staged_instance();
        let stage_span = MockSpan::new(2);
        service.put_node_span(&run, &node(&run, 2), handle(&stage_span));

        service
            .remove_node_span(&run, &node(&run, 4), &stage_span)
            .unwrap();

        let resolved = service.node_span(&run, &node(&run, 3));
        assert_ne!(resolved.span_id(), stage_span.span_id());
    }

    #[test]
    fn removal_of_an_unattached_span_is_a_structural_error() {
        let service = TraceService::new();
        let run = staged_instance();
        let never_attached = MockSpan::new(99);

        let err = service
            .remove_node_span(&run, &node(&run, 3), &never_attached)
            .unwrap_err();
        assert!(matches!(err, TraceError::RecordNotFound { .. }));
    }

    #[test]
    fn removal_from_a_plain_block_start_is_rejected() {
        let service = TraceService::new();
        let run = staged_instance();
        let span = MockSpan::new(5);

        let err = service
            .remove_node_span(&run, &node(&run, 2), &span)
            .unwrap_err();
        assert_eq!(
            err,
            TraceError::UnsupportedNodeKind {
                id: NodeId::new(2),
                kind: NodeKind::BlockStart,
            }
        );
    }

    #[test]
    fn allocation_spans_are_removed_from_the_parent_node() {
        let service = TraceService::new();
        let graph = ExecutionGraph::new();
        graph.append(1, "root", NodeKind::BlockStart, &[]).unwrap();
        graph
            .append(3, "agent", NodeKind::BlockStart, &[NodeId::new(1)])
            .unwrap();
        graph
            .append(4, "agent.allocate", NodeKind::AllocationStart, &[NodeId::new(3)])
            .unwrap();
        let run = ExecutionInstance::with_graph("job #9", graph);
        let service_span = MockSpan::new(34);
        // The acquisition span lives on the parent of the allocation node.
        service.put_node_span(&run, &node(&run, 3), handle(&service_span));

        service
            .remove_node_span(&run, &node(&run, 4), &service_span)
            .unwrap();

        assert!(node(&run, 3).records().snapshot()[0].is_purged());
    }

    #[test]
    fn step_spans_follow_the_same_precedence_as_node_spans() {
        let service = TraceService::new();
        let build = ExecutionInstance::linear("legacy #3");
        let phase = MockSpan::new(1);
        let step = MockSpan::new(2);
        service.put_phase_span(&build, Phase::Run, handle(&phase));
        service.put_step_span(&build, "compile", handle(&step));

        assert_eq!(
            service.step_span(&build, "compile").span_id(),
            step.span_id()
        );

        step.end();
        assert_eq!(
            service.step_span(&build, "compile").span_id(),
            phase.span_id()
        );
    }

    #[test]
    fn removing_a_step_span_twice_stays_idempotent() {
        let service = TraceService::new();
        let build = ExecutionInstance::linear("legacy #4");
        let step = MockSpan::new(8);
        service.put_step_span(&build, "package", handle(&step));

        service.remove_step_span(&build, "package", &step).unwrap();
        service.remove_step_span(&build, "package", &step).unwrap();

        assert_eq!(
            service.step_span(&build, "package").span_id(),
            SpanId::INVALID
        );
    }

    #[test]
    fn purge_sweeps_the_instance_and_the_whole_graph() {
        let service = TraceService::new();
        let run = staged_instance();
        let phase = MockSpan::new(1);
        let step_span = MockSpan::new(3);
        service.put_phase_span(&run, Phase::Run, handle(&phase));
        service.put_root_span(&run, handle(&MockSpan::new(10)));
        service.put_node_span(&run, &node(&run, 3), handle(&step_span));

        service.purge(&run);
        service.purge(&run);

        assert_eq!(service.phase_span(&run).span_id(), SpanId::INVALID);
        assert_eq!(service.root_span(&run).span_id(), SpanId::INVALID);
        assert_eq!(
            service.node_span(&run, &node(&run, 3)).span_id(),
            SpanId::INVALID
        );
    }

    #[test]
    fn phase_span_removal_is_a_no_op() {
        let service = TraceService::new();
        let run = staged_instance();
        let phase = MockSpan::new(1);
        service.put_phase_span(&run, Phase::Run, handle(&phase));

        service.remove_phase_span(&run, &phase);

        assert_eq!(service.phase_span(&run).span_id(), phase.span_id());
    }
}
