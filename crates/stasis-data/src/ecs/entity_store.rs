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

//! Internal entity slot storage and ID management.

use stasis_core::ecs::EntityId;

/// Internal manager for entity slots.
///
/// The `EntityStore` maintains a dense list of entity handles and their
/// alive/dead state. It handles entity creation and recycling of indices via
/// a free list. Recycled indices get an incremented generation so stale
/// handles can be detected.
#[derive(Clone, Default)]
pub(crate) struct EntityStore {
    /// One slot per index that has ever been allocated. The flag is `true`
    /// while the entity at that index is alive.
    slots: Vec<(EntityId, bool)>,
    /// Indices available for reuse.
    freed: Vec<u32>,
}

impl EntityStore {
    /// Allocates a new or recycled `EntityId`.
    pub fn create(&mut self) -> EntityId {
        if let Some(index) = self.freed.pop() {
            let slot = &mut self.slots[index as usize];
            slot.0.generation += 1;
            slot.1 = true;
            slot.0
        } else {
            let id = EntityId {
                index: self.slots.len() as u32,
                generation: 0,
            };
            self.slots.push((id, true));
            id
        }
    }

    /// Returns `true` if `id` names a currently alive entity.
    ///
    /// The generation must match the slot's current generation; a handle to a
    /// recycled index is reported dead.
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.slots
            .get(id.index as usize)
            .map(|(slot_id, alive)| *alive && slot_id.generation == id.generation)
            .unwrap_or(false)
    }

    /// Marks the entity dead and queues its index for reuse.
    ///
    /// Returns `false` if the handle was already stale.
    pub fn kill(&mut self, id: EntityId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        self.slots[id.index as usize].1 = false;
        self.freed.push(id.index);
        true
    }

    /// Iterates over all live entities in index order.
    pub fn iter_live(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.slots
            .iter()
            .filter(|(_, alive)| *alive)
            .map(|(id, _)| *id)
    }

    /// The number of currently alive entities.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|(_, alive)| *alive).count()
    }
}
