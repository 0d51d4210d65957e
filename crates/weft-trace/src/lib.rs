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

//! The span overlay engine. Resolves which trace span is active for any
//! point of a running execution, keeps the per-node span associations in
//! step with the engine as blocks open and close, and purges everything
//! when the execution terminates or is recovered after a restart.

pub mod ancestry;
mod errors;
pub mod purge;
pub mod service;

pub use errors::TraceError;
pub use service::TraceService;

/// Log target for span-resolution events.
pub const EVENT_TARGET: &str = "weft::trace";
