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

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// A unique identifier for an entity within one world.
///
/// It combines an index with a generation count to solve the "ABA problem".
/// When an entity is despawned, its index can be recycled for a new entity,
/// but the generation is incremented. This ensures that old `EntityId` handles
/// pointing to a recycled index become invalid and cannot accidentally affect
/// the new entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode,
)]
pub struct EntityId {
    /// The index of the entity's slot in the owning store.
    pub index: u32,
    /// A generation counter that is incremented each time the index is recycled.
    pub generation: u32,
}

/// A nullable, world-qualified reference to a live entity.
///
/// Components store `EntityRef`s when they need to point at other entities.
/// Unlike a bare [`EntityId`], the reference carries the name of the world the
/// entity lives in, so it stays meaningful when several named worlds coexist.
/// The default value is "no entity".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EntityRef {
    /// The name of the world the referenced entity belongs to.
    pub world: String,
    /// The referenced entity, or `None` for an unset reference.
    pub entity: Option<EntityId>,
}

impl EntityRef {
    /// Creates a reference to `entity` in the named world.
    pub fn new(world: impl Into<String>, entity: EntityId) -> Self {
        Self {
            world: world.into(),
            entity: Some(entity),
        }
    }

    /// A reference that points at nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns `true` if this reference points at an entity.
    pub fn is_set(&self) -> bool {
        self.entity.is_some()
    }
}
