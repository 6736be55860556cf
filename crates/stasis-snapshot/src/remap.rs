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

//! Translation between live entity handles and snapshot-local packed ids.

use std::collections::HashMap;

use stasis_core::ecs::EntityId;

/// A world-qualified entity, the live side of the translation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    /// The name of the owning world.
    pub world: String,
    /// The live handle within that world.
    pub entity: EntityId,
}

/// The bidirectional `(world, entity) ⇔ packed id` table for one snapshot.
///
/// Packed ids are 1-based and global across all worlds; `0` is the sentinel
/// for "no entity". A remapper is built fresh for each pack or unpack pass
/// and dropped afterwards; nothing about it persists between snapshots.
#[derive(Default)]
pub struct EntityRemapper {
    next: u32,
    forward: HashMap<EntityKey, u32>,
    reverse: HashMap<u32, EntityKey>,
}

impl EntityRemapper {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the next packed id to a live entity (pack side).
    ///
    /// Assigning the same entity twice returns the id it already has.
    pub fn assign(&mut self, world: &str, entity: EntityId) -> u32 {
        let key = EntityKey {
            world: world.to_string(),
            entity,
        };
        if let Some(existing) = self.forward.get(&key) {
            return *existing;
        }
        self.next += 1;
        let id = self.next;
        self.forward.insert(key.clone(), id);
        self.reverse.insert(id, key);
        id
    }

    /// Records the entity a packed id was restored as (unpack side).
    pub fn record(&mut self, packed: u32, world: &str, entity: EntityId) {
        let key = EntityKey {
            world: world.to_string(),
            entity,
        };
        self.forward.insert(key.clone(), packed);
        self.reverse.insert(packed, key);
        self.next = self.next.max(packed);
    }

    /// The packed id of a live entity, if it is in the table.
    pub fn packed_id(&self, world: &str, entity: EntityId) -> Option<u32> {
        let key = EntityKey {
            world: world.to_string(),
            entity,
        };
        self.forward.get(&key).copied()
    }

    /// The live entity a packed id maps to, if any. Never answers for the
    /// `0` sentinel.
    pub fn entity(&self, packed: u32) -> Option<&EntityKey> {
        if packed == 0 {
            return None;
        }
        self.reverse.get(&packed)
    }

    /// The number of mapped entities.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Returns `true` if no entity is mapped.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}
