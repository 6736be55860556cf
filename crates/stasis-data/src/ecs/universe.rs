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

use std::any::{Any, TypeId};
use std::collections::BTreeMap;

use stasis_core::ecs::{ComponentSlot, EntityId, StateStore, StoreError};

use crate::ecs::{Component, ComponentRegistry, World};

/// A set of named worlds sharing one component registry.
///
/// The `Universe` is the unit a snapshot covers: the engine enumerates its
/// worlds during a pack pass and recreates entities in a *fresh* universe
/// during an unpack pass. Worlds are kept in a `BTreeMap` so enumeration
/// order is stable.
#[derive(Default)]
pub struct Universe {
    registry: ComponentRegistry,
    worlds: BTreeMap<String, World>,
}

impl Universe {
    /// Creates an empty universe.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component type so it participates in enumeration and
    /// dynamic attach. Call once per component type at startup.
    pub fn register_component<C: Component + Clone>(&mut self) {
        self.registry.register::<C>();
    }

    /// Creates (or returns) the world with the given name.
    pub fn create_world(&mut self, name: impl Into<String>) -> &mut World {
        self.worlds.entry(name.into()).or_default()
    }

    /// Returns the named world, if it exists.
    pub fn world(&self, name: &str) -> Option<&World> {
        self.worlds.get(name)
    }

    /// Returns the named world mutably, if it exists.
    pub fn world_mut(&mut self, name: &str) -> Option<&mut World> {
        self.worlds.get_mut(name)
    }
}

impl StateStore for Universe {
    fn world_names(&self) -> Vec<String> {
        self.worlds.keys().cloned().collect()
    }

    fn live_entities(&self, world: &str) -> Vec<EntityId> {
        self.worlds
            .get(world)
            .map(|w| w.entities())
            .unwrap_or_default()
    }

    fn component_values(&self, world: &str, entity: EntityId) -> Vec<ComponentSlot> {
        let Some(w) = self.worlds.get(world) else {
            return Vec::new();
        };
        if !w.contains(entity) {
            return Vec::new();
        }
        let mut slots = Vec::new();
        for (ty, column) in &w.columns {
            let Some(value) = column.get(&entity.index) else {
                continue;
            };
            let Some(info) = self.registry.get(*ty) else {
                // Inserted through the typed API without registration; it
                // cannot be enumerated and therefore cannot be snapshotted.
                log::warn!("component column {ty:?} has no registered capability, skipping");
                continue;
            };
            if let Some(copy) = (info.dup)(value.as_ref()) {
                slots.push(ComponentSlot {
                    name: info.name.to_string(),
                    value: copy,
                });
            }
        }
        slots
    }

    fn create_entity(&mut self, world: &str) -> Result<EntityId, StoreError> {
        let w = self
            .worlds
            .get_mut(world)
            .ok_or_else(|| StoreError::UnknownWorld(world.to_string()))?;
        Ok(w.spawn())
    }

    fn attach_component(
        &mut self,
        world: &str,
        entity: EntityId,
        ty: TypeId,
        value: Box<dyn Any>,
    ) -> Result<(), StoreError> {
        let info = self
            .registry
            .get(ty)
            .ok_or_else(|| StoreError::UnknownComponentType(format!("{ty:?}")))?;
        let attach = info.attach;
        let w = self
            .worlds
            .get_mut(world)
            .ok_or_else(|| StoreError::UnknownWorld(world.to_string()))?;
        attach(w, entity, value)
    }
}
