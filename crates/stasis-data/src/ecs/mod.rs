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

//! The entity/component store.
//!
//! A [`Universe`] holds any number of named [`World`]s that share one
//! [`ComponentRegistry`]. Entity identity is handled by a generational slot
//! store; component data lives in per-type columns. The design keeps identity
//! separate from storage so a snapshot can rebuild the whole store and only
//! needs to re-link handles afterwards.

mod component;
mod entity_store;
mod registry;
mod universe;
mod world;

pub use component::Component;
pub use registry::ComponentRegistry;
pub use universe::Universe;
pub use world::World;
