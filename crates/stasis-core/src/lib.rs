// Copyright 2025 eraflo
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

//! # Stasis Core
//!
//! Foundational crate containing the types and interface contracts shared by
//! the Stasis snapshot engine and its host collaborators: entity identifiers,
//! the state-store contract, the shared dynamic cell used by polymorphic
//! slots, and the host object registry that outlives a store rebuild.

#![warn(missing_docs)]

pub mod ecs;
pub mod host;
pub mod math;
pub mod shared;

pub use host::{HostHandle, HostRegistry};
pub use shared::SharedAny;
