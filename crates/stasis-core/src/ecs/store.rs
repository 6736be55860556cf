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

//! The minimal contract the snapshot engine requires from an entity store.

use std::any::{Any, TypeId};
use std::fmt;

use crate::ecs::EntityId;

/// One enumerated component value, paired with a human-readable type name
/// used for diagnostics.
pub struct ComponentSlot {
    /// The component's type name (as registered with the store).
    pub name: String,
    /// A copy of the component value, type-erased.
    pub value: Box<dyn Any>,
}

/// The contract between the snapshot engine and the live entity store.
///
/// The engine drives a full pack pass (enumerate worlds, entities and
/// component values) and a full unpack pass (create fresh entities, attach
/// components discovered at runtime) exclusively through this surface. The
/// engine never assumes anything about how the store lays its data out.
pub trait StateStore {
    /// The names of all worlds currently held by the store.
    fn world_names(&self) -> Vec<String>;

    /// All live entities within the named world, in a stable order.
    fn live_entities(&self, world: &str) -> Vec<EntityId>;

    /// Copies of all non-null component values attached to `entity`.
    fn component_values(&self, world: &str, entity: EntityId) -> Vec<ComponentSlot>;

    /// Creates a new, empty entity in the named world.
    fn create_entity(&mut self, world: &str) -> Result<EntityId, StoreError>;

    /// Attaches (or replaces) a component whose concrete type is only known
    /// at runtime. The store dispatches on `ty` to recover the static type.
    fn attach_component(
        &mut self,
        world: &str,
        entity: EntityId,
        ty: TypeId,
        value: Box<dyn Any>,
    ) -> Result<(), StoreError>;
}

/// An error raised by a [`StateStore`] implementation.
#[derive(Debug)]
pub enum StoreError {
    /// The named world does not exist in this store.
    UnknownWorld(String),
    /// The entity handle is stale or was never alive.
    DeadEntity(EntityId),
    /// No component capability is registered for the requested type.
    UnknownComponentType(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::UnknownWorld(name) => {
                write!(f, "unknown world '{name}'")
            }
            StoreError::DeadEntity(id) => {
                write!(
                    f,
                    "entity {}v{} is not alive in this store",
                    id.index, id.generation
                )
            }
            StoreError::UnknownComponentType(name) => {
                write!(f, "no component capability registered for {name}")
            }
        }
    }
}

impl std::error::Error for StoreError {}
