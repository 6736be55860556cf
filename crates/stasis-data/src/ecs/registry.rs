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

use std::any::{self, Any, TypeId};
use std::collections::HashMap;

use stasis_core::ecs::{EntityId, StoreError};

use crate::ecs::{Component, World};

/// Per-component-type capabilities, built once at registration time.
///
/// The vtable is what lets the store work with values whose concrete type is
/// only known at runtime (the unpacker discovers component types from a
/// snapshot): duplicate a value for enumeration, or attach a boxed value to
/// an entity, all without reflection.
pub(crate) struct ComponentInfo {
    /// Human-readable type name, used for diagnostics.
    pub(crate) name: &'static str,
    /// Clones a type-erased component value.
    pub(crate) dup: fn(&dyn Any) -> Option<Box<dyn Any>>,
    /// Attaches (or replaces) a boxed component value on an entity.
    pub(crate) attach: fn(&mut World, EntityId, Box<dyn Any>) -> Result<(), StoreError>,
}

/// A registry mapping component types to their capabilities.
///
/// Every component type that should participate in store enumeration and
/// dynamic attach must be registered here, typically once at startup.
#[derive(Default)]
pub struct ComponentRegistry {
    map: HashMap<TypeId, ComponentInfo>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component type, building its capability vtable.
    pub fn register<C: Component + Clone>(&mut self) {
        self.map.insert(
            TypeId::of::<C>(),
            ComponentInfo {
                name: any::type_name::<C>(),
                dup: |value| {
                    value
                        .downcast_ref::<C>()
                        .map(|c| Box::new(c.clone()) as Box<dyn Any>)
                },
                attach: |world, entity, value| match value.downcast::<C>() {
                    Ok(component) => world.insert(entity, *component),
                    Err(_) => Err(StoreError::UnknownComponentType(
                        any::type_name::<C>().to_string(),
                    )),
                },
            },
        );
    }

    /// Looks up the capabilities for a component type.
    pub(crate) fn get(&self, ty: TypeId) -> Option<&ComponentInfo> {
        self.map.get(&ty)
    }
}
