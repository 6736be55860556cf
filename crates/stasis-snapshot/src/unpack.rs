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

//! The graph unpacker: persisted documents back into live object graphs.

use std::any::{Any, TypeId};
use std::fmt;

use stasis_core::SharedAny;

use crate::catalog::ResolvedTypes;
use crate::convert::{ConverterRegistry, UnpackContext};
use crate::document::{Payload, RootIndex, SnapshotDocument, Value};
use crate::error::SnapshotError;
use crate::remap::EntityRemapper;
use crate::schema::{take_as, SchemaRegistry, TypeKind};

/// Rebuilds the object graph of one [`SnapshotDocument`].
///
/// The rebuild is two-phase. Phase one walks the instance table in ascending
/// id order and allocates one default-constructed shell per instance in a
/// shared-cell arena, so every reference has a target before any field is
/// resolved. Phase two walks in strictly *descending* id order, populating
/// fields and applying each instance's runtime-type converter in place; by
/// the time an instance is populated, everything it can reference is already
/// in its final shape.
pub struct GraphUnpacker<'a> {
    schema: &'a SchemaRegistry,
    converters: &'a ConverterRegistry,
    ctx: UnpackContext<'a>,
    doc: &'a SnapshotDocument,
    arena: Vec<SharedAny>,
}

impl<'a> GraphUnpacker<'a> {
    /// Creates an unpacker over the given registries, id table and document.
    pub fn new(
        schema: &'a SchemaRegistry,
        converters: &'a ConverterRegistry,
        remapper: &'a EntityRemapper,
        doc: &'a SnapshotDocument,
    ) -> Self {
        Self {
            schema,
            converters,
            ctx: UnpackContext { remapper },
            doc,
            arena: Vec::new(),
        }
    }

    /// Runs the full rebuild, yielding the resolved roots.
    pub fn run(mut self) -> Result<UnpackedRoots<'a>, SnapshotError> {
        let types = ResolvedTypes::resolve(&self.doc.type_names, self.schema, self.converters)?;

        // Phase 1: allocate shells, ascending.
        for instance in &self.doc.instances {
            if instance.id as usize != self.arena.len() + 1 {
                return Err(SnapshotError::Corrupt(format!(
                    "instance id {} out of allocation order",
                    instance.id
                )));
            }
            let ty = types.get(instance.ty)?;
            let schema = self.schema;
            let Some(TypeKind::Struct(st)) = schema.kind(ty) else {
                return Err(SnapshotError::Corrupt(format!(
                    "instance {} names a non-struct type",
                    instance.id
                )));
            };
            self.arena.push(SharedAny::from_box((st.make_default)()));
        }

        // Phase 2: populate, descending.
        for instance in self.doc.instances.iter().rev() {
            let ty = types.get(instance.ty)?;
            let Some(TypeKind::Struct(st)) = self.schema.kind(ty) else {
                return Err(SnapshotError::Corrupt(format!(
                    "instance {} names a non-struct type",
                    instance.id
                )));
            };
            let cell = self.arena[instance.id as usize - 1].clone();
            {
                let mut guard = cell.borrow_mut();
                for property in &instance.properties {
                    let field = st.field(&property.name).ok_or_else(|| {
                        SnapshotError::FieldResolution {
                            ty: st.name.name.clone(),
                            field: property.name.clone(),
                        }
                    })?;
                    let Some(resolved) = self.resolve_value(&types, &property.value)? else {
                        continue;
                    };
                    if !(field.set)(&mut **guard, resolved) {
                        return Err(SnapshotError::Corrupt(format!(
                            "field '{}' of '{}' rejected its persisted value",
                            property.name, st.name.name
                        )));
                    }
                }
            }
            // The instance-level converter replaces the shell's contents in
            // place, so every holder of the cell observes the final value.
            if let Some(runtime_ty) = instance.runtime_ty {
                let runtime = types.get(runtime_ty)?;
                if let Some(entry) = self.converters.get(runtime) {
                    let proxy = cell.replace(Box::new(()));
                    let restored = (entry.unpack)(proxy, &self.ctx).ok_or_else(|| {
                        SnapshotError::Corrupt(format!(
                            "converter rejected the populated proxy of instance {}",
                            instance.id
                        ))
                    })?;
                    cell.replace(restored);
                }
            }
        }

        let mut values = Vec::with_capacity(self.doc.roots.len());
        for root in &self.doc.roots {
            values.push(self.resolve_value(&types, root)?);
        }
        Ok(UnpackedRoots {
            schema: self.schema,
            converters: self.converters,
            values,
        })
    }

    /// Resolves one persisted value slot to a live value.
    ///
    /// `Ok(None)` means the slot legitimately holds nothing.
    fn resolve_value(
        &self,
        types: &ResolvedTypes,
        value: &Value,
    ) -> Result<Option<Box<dyn Any>>, SnapshotError> {
        match &value.payload {
            Payload::Null => {
                // A null slot whose runtime type converts from a value-like
                // proxy gets the proxy's zero value substituted.
                if let Some(runtime_ty) = value.runtime {
                    let runtime = types.get(runtime_ty)?;
                    if let Some(entry) = self.converters.get(runtime) {
                        let restored =
                            (entry.unpack)((entry.zero)(), &self.ctx).ok_or_else(|| {
                                SnapshotError::Corrupt(
                                    "converter rejected its own zero value".into(),
                                )
                            })?;
                        return Ok(Some(restored));
                    }
                }
                Ok(None)
            }
            Payload::Reference(0) => Ok(None),
            Payload::Reference(id) => {
                let cell = self.arena.get(*id as usize - 1).ok_or_else(|| {
                    SnapshotError::Corrupt(format!("reference to unknown instance {id}"))
                })?;
                Ok(Some(Box::new(cell.clone())))
            }
            Payload::Sequence(elements) => {
                let stored = self.stored_type(types, value)?;
                let Some(TypeKind::Sequence(vt)) = self.schema.kind(stored) else {
                    return Err(SnapshotError::Corrupt(
                        "sequence payload stored under a non-sequence type".into(),
                    ));
                };
                let mut resolved = Vec::with_capacity(elements.len());
                for element in elements {
                    resolved.push(self.resolve_value(types, element)?);
                }
                let rebuilt = (vt.rebuild)(resolved).ok_or_else(|| {
                    SnapshotError::Corrupt("sequence elements did not match their container".into())
                })?;
                self.apply_converter(types, value, rebuilt)
            }
            Payload::Int(_)
            | Payload::Float(_)
            | Payload::Bool(_)
            | Payload::Str(_)
            | Payload::External(_) => {
                let stored = self.stored_type(types, value)?;
                let Some(TypeKind::Leaf(vt)) = self.schema.kind(stored) else {
                    return Err(SnapshotError::Corrupt(
                        "scalar payload stored under a non-leaf type".into(),
                    ));
                };
                let loaded = (vt.load)(&value.payload, &self.doc.pools).ok_or_else(|| {
                    SnapshotError::Corrupt("scalar pool entry missing or out of range".into())
                })?;
                self.apply_converter(types, value, loaded)
            }
        }
    }

    fn stored_type(&self, types: &ResolvedTypes, value: &Value) -> Result<TypeId, SnapshotError> {
        let stored = value.stored.ok_or_else(|| {
            SnapshotError::Corrupt("non-null value without a stored type".into())
        })?;
        types.get(stored)
    }

    /// Re-applies the value's runtime-type converter, when one was involved
    /// at pack time. The converter runs whenever the value carries a runtime
    /// type, including when the proxy type equals the runtime type.
    fn apply_converter(
        &self,
        types: &ResolvedTypes,
        value: &Value,
        loaded: Box<dyn Any>,
    ) -> Result<Option<Box<dyn Any>>, SnapshotError> {
        if let Some(runtime_ty) = value.runtime {
            let runtime = types.get(runtime_ty)?;
            if let Some(entry) = self.converters.get(runtime) {
                let restored = (entry.unpack)(loaded, &self.ctx).ok_or_else(|| {
                    SnapshotError::Corrupt("converter rejected a persisted proxy value".into())
                })?;
                return Ok(Some(restored));
            }
        }
        Ok(Some(loaded))
    }
}

/// The resolved roots of an unpacked document.
///
/// Roots come back type-erased; [`take`](Self::take) recovers a typed value
/// and [`concrete`](Self::concrete) recovers the value together with its
/// `TypeId`, unwrapping the arena cell a struct root resolves through.
pub struct UnpackedRoots<'a> {
    schema: &'a SchemaRegistry,
    converters: &'a ConverterRegistry,
    values: Vec<Option<Box<dyn Any>>>,
}

impl fmt::Debug for UnpackedRoots<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnpackedRoots")
            .field("len", &self.values.len())
            .finish()
    }
}

impl UnpackedRoots<'_> {
    /// The number of roots in the document.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the document had no roots.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// A borrowed view of one resolved root.
    pub fn value(&self, index: RootIndex) -> Option<&dyn Any> {
        self.values
            .get(index.0 as usize)
            .and_then(|slot| slot.as_deref())
    }

    /// Takes one root out as a typed value, unwrapping a shared cell when
    /// the root resolved through one.
    pub fn take<T: Clone + 'static>(&mut self, index: RootIndex) -> Option<T> {
        let slot = self.values.get_mut(index.0 as usize)?;
        take_as::<T>(slot.take()?)
    }

    /// Takes one root out as `(type, value)`, cloning the concrete value out
    /// of its arena cell when the root resolved through one.
    ///
    /// Returns `None` when the root resolved to nothing.
    pub fn concrete(&mut self, index: RootIndex) -> Option<(TypeId, Box<dyn Any>)> {
        let slot = self.values.get_mut(index.0 as usize)?;
        let boxed = slot.take()?;
        match boxed.downcast::<SharedAny>() {
            Ok(cell) => {
                let guard = cell.borrow();
                let inner: &dyn Any = &**guard;
                let ty = inner.type_id();
                let copy = match self.schema.kind(ty) {
                    Some(TypeKind::Struct(st)) => (st.dup)(inner),
                    Some(TypeKind::Leaf(vt)) => (vt.dup)(inner),
                    _ => self.converters.get(ty).and_then(|entry| (entry.dup)(inner)),
                }?;
                Some((ty, copy))
            }
            Err(plain) => {
                let ty = (*plain).type_id();
                Some((ty, plain))
            }
        }
    }
}
