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

//! Converters: runtime types that persist as a different, stable shape.
//!
//! A converter substitutes a persistable proxy for a runtime value before
//! structural inspection, and turns the proxy back into the runtime value
//! after structural reconstruction. The canonical entry is the entity
//! handle: live generational handles persist as snapshot-local packed ids.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::document::TypeName;
use crate::remap::EntityRemapper;
use crate::schema::take_as;

/// Everything a pack-side converter may consult.
///
/// Contexts are threaded explicitly through every conversion; converters
/// never reach for ambient state.
pub struct PackContext<'a> {
    /// The entity-id translation table for the snapshot being packed.
    pub remapper: &'a EntityRemapper,
}

/// Everything an unpack-side converter may consult.
pub struct UnpackContext<'a> {
    /// The entity-id translation table for the snapshot being restored.
    pub remapper: &'a EntityRemapper,
}

/// One registered conversion, type-erased.
pub(crate) struct ConverterEntry {
    /// The persisted name of the runtime type.
    pub(crate) runtime_name: TypeName,
    /// Converts a runtime value into its persistable proxy.
    pub(crate) pack: Box<dyn Fn(&dyn Any, &PackContext<'_>) -> Option<Box<dyn Any>>>,
    /// Converts a proxy back into the runtime value.
    pub(crate) unpack: Box<dyn Fn(Box<dyn Any>, &UnpackContext<'_>) -> Option<Box<dyn Any>>>,
    /// The proxy's zero value, substituted when a slot persisted as null.
    pub(crate) zero: Box<dyn Fn() -> Box<dyn Any>>,
    /// Clones a type-erased runtime value.
    pub(crate) dup: Box<dyn Fn(&dyn Any) -> Option<Box<dyn Any>>>,
}

/// The registry of conversions, at most one per runtime type.
#[derive(Default)]
pub struct ConverterRegistry {
    map: HashMap<TypeId, ConverterEntry>,
    by_name: HashMap<TypeName, TypeId>,
}

impl ConverterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a conversion for runtime type `R`, persisting it as `P`.
    ///
    /// Registering a second conversion for the same `R` replaces the first.
    pub fn register<R, P>(
        &mut self,
        pack: impl Fn(&R, &PackContext<'_>) -> P + 'static,
        unpack: impl Fn(P, &UnpackContext<'_>) -> R + 'static,
    ) where
        R: Clone + 'static,
        P: Clone + Default + 'static,
    {
        let name = TypeName::of::<R>();
        self.by_name.insert(name.clone(), TypeId::of::<R>());
        self.map.insert(
            TypeId::of::<R>(),
            ConverterEntry {
                runtime_name: name,
                pack: Box::new(move |any, ctx| {
                    any.downcast_ref::<R>()
                        .map(|r| Box::new(pack(r, ctx)) as Box<dyn Any>)
                }),
                unpack: Box::new(move |boxed, ctx| {
                    let proxy = take_as::<P>(boxed)?;
                    Some(Box::new(unpack(proxy, ctx)) as Box<dyn Any>)
                }),
                zero: Box::new(|| Box::new(P::default())),
                dup: Box::new(|any| {
                    any.downcast_ref::<R>()
                        .map(|r| Box::new(r.clone()) as Box<dyn Any>)
                }),
            },
        );
    }

    pub(crate) fn get(&self, ty: TypeId) -> Option<&ConverterEntry> {
        self.map.get(&ty)
    }

    pub(crate) fn type_by_name(&self, name: &TypeName) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }
}
