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

use opentelemetry::{
    Context,
    trace::{SpanId, TraceContextExt},
};
use std::{fmt::Debug, sync::Arc};
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Handle onto one trace span created by the tracing backend.
///
/// The overlay only ever reads a span through this interface: its identity,
/// whether the backend has ended it, and the context to parent or activate
/// new work under. Creating and ending spans stays on the backend side.
pub trait SpanHandle: Debug + Send + Sync {
    /// Stable identity of the underlying span.
    fn span_id(&self) -> SpanId;

    /// True once the backend has ended the span.
    ///
    /// A span that never recorded (sampled out, or lost across a process
    /// restart) also reports ended, so lookups degrade to the enclosing
    /// phase span instead of resolving a dead handle.
    fn has_ended(&self) -> bool;

    /// Context carrying the span, for parenting and scope entry.
    fn context(&self) -> Context;
}

/// Production handle: an OpenTelemetry context carrying the span.
#[derive(Debug, Clone)]
pub struct OtelSpan {
    context: Context,
}

impl OtelSpan {
    pub fn new(context: Context) -> Self {
        Self { context }
    }

    /// Wrap a freshly started span together with the context around it.
    pub fn from_span<S>(span: S) -> Self
    where
        S: opentelemetry::trace::Span + Send + Sync + 'static,
    {
        Self {
            context: Context::current_with_span(span),
        }
    }
}

impl SpanHandle for OtelSpan {
    fn span_id(&self) -> SpanId {
        self.context.span().span_context().span_id()
    }

    fn has_ended(&self) -> bool {
        !self.context.span().is_recording()
    }

    fn context(&self) -> Context {
        self.context.clone()
    }
}

/// The explicit no-op handle.
///
/// Returned whenever a lookup finds nothing: it is already ended, carries
/// no identity, and activating it restores an empty ambient context.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvalidSpan;

impl SpanHandle for InvalidSpan {
    fn span_id(&self) -> SpanId {
        SpanId::INVALID
    }

    fn has_ended(&self) -> bool {
        true
    }

    fn context(&self) -> Context {
        Context::new()
    }
}

/// The no-op handle, shared; lookups return this instead of an absent span
/// so callers never need to null-check.
pub fn invalid() -> Arc<dyn SpanHandle> {
    Arc::new(InvalidSpan)
}

/// Make the current tracing span a child of the given handle.
///
/// This is needed to ensure tracing keeps track of dependencies between
/// execution branches, properly connecting related spans even though they
/// are crossing thread boundaries.
pub fn adopt_current_span(handle: &dyn SpanHandle) -> tracing::Span {
    let span = tracing::Span::current();
    span.set_parent(handle.context());
    span
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Backend-less handle with a manually driven lifecycle.
    #[derive(Debug, Clone)]
    pub struct MockSpan {
        id: SpanId,
        ended: Arc<AtomicBool>,
    }

    impl MockSpan {
        /// A still-active handle with the given numeric id (non-zero; zero
        /// is the invalid id).
        pub fn new(id: u64) -> Self {
            Self {
                id: SpanId::from_bytes(id.to_be_bytes()),
                ended: Arc::new(AtomicBool::new(false)),
            }
        }

        /// End the span, as the backend would.
        pub fn end(&self) {
            self.ended.store(true, Ordering::Release);
        }
    }

    impl SpanHandle for MockSpan {
        fn span_id(&self) -> SpanId {
            self.id
        }

        fn has_ended(&self) -> bool {
            self.ended.load(Ordering::Acquire)
        }

        fn context(&self) -> Context {
            Context::new()
        }
    }
}
