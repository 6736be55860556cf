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
use std::collections::{BTreeMap, HashMap};

use stasis_core::ecs::{EntityId, StoreError};

use crate::ecs::entity_store::EntityStore;
use crate::ecs::Component;

/// One world's worth of entities and component data.
///
/// Entity identity is managed by the generational [`EntityStore`]; component
/// data lives in per-type columns keyed by entity index. Columns are kept in
/// a `BTreeMap` so enumeration order is deterministic, which keeps snapshot
/// layouts reproducible.
#[derive(Default)]
pub struct World {
    pub(crate) entities: EntityStore,
    pub(crate) columns: BTreeMap<TypeId, HashMap<u32, Box<dyn Any>>>,
}

impl World {
    /// Creates a new, empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a new, empty entity.
    pub fn spawn(&mut self) -> EntityId {
        self.entities.create()
    }

    /// Despawns an entity, dropping all of its components.
    ///
    /// Returns `false` if the handle was stale.
    pub fn despawn(&mut self, entity: EntityId) -> bool {
        if !self.entities.kill(entity) {
            return false;
        }
        for column in self.columns.values_mut() {
            column.remove(&entity.index);
        }
        true
    }

    /// Returns `true` if `entity` is alive in this world.
    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.is_alive(entity)
    }

    /// All live entities, in index order.
    pub fn entities(&self) -> Vec<EntityId> {
        self.entities.iter_live().collect()
    }

    /// The number of live entities.
    pub fn len(&self) -> usize {
        self.entities.live_count()
    }

    /// Returns `true` if no entity is alive.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attaches (or replaces) a component on an entity.
    pub fn insert<C: Component>(&mut self, entity: EntityId, component: C) -> Result<(), StoreError> {
        self.insert_raw(entity, TypeId::of::<C>(), Box::new(component))
    }

    /// Attaches a type-erased component value. The caller guarantees that
    /// `ty` is the value's actual type.
    pub(crate) fn insert_raw(
        &mut self,
        entity: EntityId,
        ty: TypeId,
        value: Box<dyn Any>,
    ) -> Result<(), StoreError> {
        if !self.entities.is_alive(entity) {
            return Err(StoreError::DeadEntity(entity));
        }
        self.columns
            .entry(ty)
            .or_default()
            .insert(entity.index, value);
        Ok(())
    }

    /// Returns a reference to an entity's component of type `C`.
    pub fn get<C: Component>(&self, entity: EntityId) -> Option<&C> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.columns
            .get(&TypeId::of::<C>())
            .and_then(|column| column.get(&entity.index))
            .and_then(|value| value.downcast_ref::<C>())
    }

    /// Returns a mutable reference to an entity's component of type `C`.
    pub fn get_mut<C: Component>(&mut self, entity: EntityId) -> Option<&mut C> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.columns
            .get_mut(&TypeId::of::<C>())
            .and_then(|column| column.get_mut(&entity.index))
            .and_then(|value| value.downcast_mut::<C>())
    }

    /// Removes and returns an entity's component of type `C`.
    pub fn remove<C: Component>(&mut self, entity: EntityId) -> Option<C> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.columns
            .get_mut(&TypeId::of::<C>())
            .and_then(|column| column.remove(&entity.index))
            .and_then(|value| value.downcast::<C>().ok())
            .map(|boxed| *boxed)
    }
}
