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

//! The graph packer: live object graphs into persisted documents.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use stasis_core::SharedAny;

use crate::catalog::TypeCatalog;
use crate::convert::{ConverterRegistry, PackContext};
use crate::document::{
    Instance, Payload, Property, RootIndex, SnapshotDocument, TypeRef, Value, ValuePools,
};
use crate::error::SnapshotError;
use crate::remap::EntityRemapper;
use crate::schema::{SchemaRegistry, TypeKind};

/// Packs live values into one [`SnapshotDocument`].
///
/// A packer accumulates state across any number of [`pack_root`] calls: one
/// type catalog, one set of pools, one instance table, and one identity
/// cache, so shared cells deduplicate across roots. [`finish`] seals the
/// document.
///
/// [`pack_root`]: GraphPacker::pack_root
/// [`finish`]: GraphPacker::finish
pub struct GraphPacker<'a> {
    schema: &'a SchemaRegistry,
    converters: &'a ConverterRegistry,
    ctx: PackContext<'a>,
    catalog: TypeCatalog,
    pools: ValuePools,
    instances: Vec<Instance>,
    roots: Vec<Value>,
    /// Identity cache: cell key → the value it packed as. Primed with the
    /// instance reference *before* fields are walked, so cycles terminate.
    dedup: HashMap<usize, Value>,
    /// Keeps every intercepted cell alive for the duration of the pack, so
    /// the keys in `dedup` stay unambiguous.
    retained: Vec<SharedAny>,
}

impl<'a> GraphPacker<'a> {
    /// Creates a packer over the given registries and id table.
    pub fn new(
        schema: &'a SchemaRegistry,
        converters: &'a ConverterRegistry,
        remapper: &'a EntityRemapper,
    ) -> Self {
        Self {
            schema,
            converters,
            ctx: PackContext { remapper },
            catalog: TypeCatalog::new(),
            pools: ValuePools::default(),
            instances: Vec::new(),
            roots: Vec::new(),
            dedup: HashMap::new(),
            retained: Vec::new(),
        }
    }

    /// Packs one root value, returning its index within the document.
    pub fn pack_root(&mut self, value: &dyn Any) -> Result<RootIndex, SnapshotError> {
        let packed = self.pack_value(value, false)?;
        let index = RootIndex(self.roots.len() as u32);
        self.roots.push(packed);
        Ok(index)
    }

    /// Seals the accumulated state into a document.
    pub fn finish(self) -> SnapshotDocument {
        SnapshotDocument {
            type_names: self.catalog.into_names(),
            pools: self.pools,
            instances: self.instances,
            roots: self.roots,
        }
    }

    fn pack_value(&mut self, value: &dyn Any, in_sequence: bool) -> Result<Value, SnapshotError> {
        // Shared cells are intercepted before anything else: a cell already
        // seen packs as whatever it packed as the first time.
        if let Some(cell) = value.downcast_ref::<SharedAny>() {
            let key = cell.key();
            if let Some(cached) = self.dedup.get(&key) {
                return Ok(cached.clone());
            }
            self.retained.push(cell.clone());
            let guard = cell.borrow();
            let packed = self.pack_concrete(&**guard, in_sequence, Some(key))?;
            drop(guard);
            // Struct contents primed the cache already; anything else is
            // cached here.
            self.dedup.entry(key).or_insert_with(|| packed.clone());
            return Ok(packed);
        }
        self.pack_concrete(value, in_sequence, None)
    }

    fn pack_concrete(
        &mut self,
        value: &dyn Any,
        in_sequence: bool,
        cache_key: Option<usize>,
    ) -> Result<Value, SnapshotError> {
        // Conversion happens before structural inspection; the converted
        // value's kind decides the persisted shape.
        let converters = self.converters;
        let mut runtime = None;
        let converted = match converters.get(value.type_id()) {
            Some(entry) => {
                runtime = Some(self.catalog.intern(&entry.runtime_name));
                let proxy = (entry.pack)(value, &self.ctx).ok_or_else(|| {
                    SnapshotError::Corrupt(format!(
                        "converter for '{}' rejected its own runtime type",
                        entry.runtime_name.name
                    ))
                })?;
                Some(proxy)
            }
            None => None,
        };
        let current: &dyn Any = match &converted {
            Some(boxed) => &**boxed,
            None => value,
        };
        let ty = current.type_id();

        let schema = self.schema;
        match schema.kind(ty) {
            Some(TypeKind::Leaf(vt)) => {
                let payload = (vt.store)(current, &mut self.pools).ok_or_else(|| {
                    SnapshotError::Corrupt("leaf value did not match its registered type".into())
                })?;
                let stored = self.intern_type(ty)?;
                Ok(Value {
                    runtime,
                    stored: Some(stored),
                    payload,
                })
            }
            Some(TypeKind::Sequence(vt)) => {
                if in_sequence {
                    return Err(SnapshotError::UnsupportedShape {
                        ty: self.type_label(ty),
                    });
                }
                let elements = (vt.iterate)(current).ok_or_else(|| {
                    SnapshotError::Corrupt(
                        "sequence value did not match its registered type".into(),
                    )
                })?;
                let mut packed = Vec::with_capacity(elements.len());
                for element in &elements {
                    packed.push(self.pack_value(&**element, true)?);
                }
                let stored = self.intern_type(ty)?;
                Ok(Value {
                    runtime,
                    stored: Some(stored),
                    payload: Payload::Sequence(packed),
                })
            }
            Some(TypeKind::Struct(_)) => self.pack_struct(ty, runtime, current, cache_key),
            // Unregistered shapes degrade to a null slot; the caller drops
            // scalar nulls from the instance.
            None => Ok(Value::null(runtime)),
        }
    }

    /// Packs a struct value as a fresh instance.
    ///
    /// The instance id is allocated, and the identity cache primed with the
    /// resulting reference, *before* any field is walked. A cycle back to
    /// this value therefore resolves through the cache instead of recursing
    /// forever, and a parent's id is always smaller than its children's.
    fn pack_struct(
        &mut self,
        ty: TypeId,
        runtime: Option<TypeRef>,
        value: &dyn Any,
        cache_key: Option<usize>,
    ) -> Result<Value, SnapshotError> {
        let stored = self.intern_type(ty)?;
        let id = self.instances.len() as u32 + 1;
        let reference = Value {
            runtime,
            stored: Some(stored),
            payload: Payload::Reference(id),
        };
        if let Some(key) = cache_key {
            self.dedup.insert(key, reference.clone());
        }
        self.instances.push(Instance {
            id,
            ty: stored,
            runtime_ty: runtime,
            properties: Vec::new(),
        });
        let slot = self.instances.len() - 1;

        let schema = self.schema;
        let Some(TypeKind::Struct(st)) = schema.kind(ty) else {
            return Err(SnapshotError::Corrupt(
                "instance type vanished from the registry mid-pack".into(),
            ));
        };

        let mut properties = Vec::new();
        for field in &st.fields {
            // An absent optional or unset shared slot is an implicit null.
            let Some(field_value) = (field.get)(value) else {
                continue;
            };
            let packed = self.pack_value(&*field_value, false)?;
            // Null scalars are dropped; an empty sequence is real data and
            // stays.
            if packed.is_null() {
                continue;
            }
            properties.push(Property {
                name: field.name.to_string(),
                value: packed,
            });
        }
        self.instances[slot].properties = properties;
        Ok(reference)
    }

    fn intern_type(&mut self, ty: TypeId) -> Result<TypeRef, SnapshotError> {
        let schema = self.schema;
        let name = schema.name(ty).ok_or_else(|| {
            SnapshotError::Corrupt("registered type has no recorded name".into())
        })?;
        Ok(self.catalog.intern(name))
    }

    fn type_label(&self, ty: TypeId) -> String {
        self.schema
            .name(ty)
            .map(|n| n.name.clone())
            .unwrap_or_else(|| format!("{ty:?}"))
    }
}
