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

//! # Stasis Data
//!
//! A reference entity/component store. It implements the
//! [`StateStore`](stasis_core::ecs::StateStore) contract consumed by the
//! snapshot engine: named worlds, generational entity handles with index
//! recycling, per-type component columns, and a capability-indexed component
//! registry so components discovered at runtime can be attached without
//! reflection.

pub mod ecs;

pub use ecs::{Component, ComponentRegistry, Universe, World};
