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

//! Shared primitives of the weft span overlay: handles onto backend trace
//! spans, and the monitoring records that bind those spans to the execution
//! state they annotate.

pub mod record;
pub mod span;

pub use opentelemetry::trace::SpanId;
pub use record::{MonitoringRecord, Phase, RecordKind, RecordList};
pub use span::{InvalidSpan, OtelSpan, SpanHandle, adopt_current_span, invalid};
