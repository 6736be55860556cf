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

//! Registry of host-owned objects that outlive a store rebuild.

use std::collections::BTreeMap;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::shared::SharedAny;

/// An opaque, persistable token naming one host-owned object.
///
/// Handles are plain integers and survive any envelope unchanged; only the
/// [`HostRegistry`] that issued a handle can resolve it back to a live
/// object. Component fields that reference host objects store a `HostHandle`
/// and the snapshot engine persists it verbatim in the external-reference
/// pool.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Encode, Decode,
)]
pub struct HostHandle(pub u64);

/// An arena of host-owned objects.
///
/// The host application registers here every object that (a) can be pointed
/// at from component fields, or (b) holds a reference *into* tracked state
/// (an incoming link). Because the registry lives outside the entity store,
/// its contents survive a full teardown/rebuild of the store; a snapshot only
/// needs to persist the handles.
#[derive(Default)]
pub struct HostRegistry {
    next: u64,
    slots: BTreeMap<u64, SharedAny>,
}

impl HostRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an object, returning its handle.
    pub fn insert<T: 'static>(&mut self, object: T) -> HostHandle {
        self.insert_cell(SharedAny::new(object))
    }

    /// Registers an already-shared cell, returning its handle.
    pub fn insert_cell(&mut self, cell: SharedAny) -> HostHandle {
        let id = self.next;
        self.next += 1;
        self.slots.insert(id, cell);
        HostHandle(id)
    }

    /// Resolves a handle back to its live object, if still registered.
    pub fn get(&self, handle: HostHandle) -> Option<&SharedAny> {
        self.slots.get(&handle.0)
    }

    /// Iterates over all registered objects in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (HostHandle, &SharedAny)> {
        self.slots.iter().map(|(id, cell)| (HostHandle(*id), cell))
    }

    /// The number of registered objects.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
