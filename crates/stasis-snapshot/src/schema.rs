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

//! The schema registry: explicit field-descriptor tables instead of runtime
//! reflection.
//!
//! Every type that participates in packing is registered here as one of
//! three kinds. *Leaves* persist through one of the typed scalar pools.
//! *Sequences* persist element-wise. *Structs* persist as instances, field
//! by field, through descriptor tables built with [`StructSchemaBuilder`].
//! Registering a struct is what marks it serializable; unregistered types
//! degrade to null slots at pack time.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;

use stasis_core::{math::Vec3, HostHandle, SharedAny};

use crate::document::{Payload, TypeName, ValuePools};

/// Recovers a concrete `T` from a resolved slot value.
///
/// Resolved struct values arrive wrapped in a [`SharedAny`] cell (references
/// resolve to the unpack arena); plain slots want the value itself. This
/// unwraps the cell with a clone when needed, and is the identity for a slot
/// that *is* a cell (`T = SharedAny`).
pub fn take_as<T: Clone + 'static>(value: Box<dyn Any>) -> Option<T> {
    match value.downcast::<T>() {
        Ok(v) => Some(*v),
        Err(other) => other
            .downcast::<SharedAny>()
            .ok()
            .and_then(|cell| cell.get::<T>()),
    }
}

/// Borrowing variant of [`take_as`].
pub fn clone_as<T: Clone + 'static>(value: &dyn Any) -> Option<T> {
    if let Some(v) = value.downcast_ref::<T>() {
        return Some(v.clone());
    }
    value
        .downcast_ref::<SharedAny>()
        .and_then(|cell| cell.get::<T>())
}

/// How a leaf type moves through the scalar pools.
pub(crate) struct LeafVtable {
    /// Appends the value to its pool, returning the payload that names the
    /// slot. `None` means the value was not of the expected type.
    pub(crate) store: Box<dyn Fn(&dyn Any, &mut ValuePools) -> Option<Payload>>,
    /// Reads the value back out of its pool.
    pub(crate) load: Box<dyn Fn(&Payload, &ValuePools) -> Option<Box<dyn Any>>>,
    /// Clones a type-erased value.
    pub(crate) dup: Box<dyn Fn(&dyn Any) -> Option<Box<dyn Any>>>,
}

/// How a sequence type is taken apart and rebuilt.
pub(crate) struct SequenceVtable {
    /// Clones the elements out, type-erased, in order.
    pub(crate) iterate: Box<dyn Fn(&dyn Any) -> Option<Vec<Box<dyn Any>>>>,
    /// Rebuilds the container from resolved elements. A missing element
    /// becomes the element type's default value.
    pub(crate) rebuild: Box<dyn Fn(Vec<Option<Box<dyn Any>>>) -> Option<Box<dyn Any>>>,
}

/// One declared field of a struct schema.
pub(crate) struct FieldSchema {
    pub(crate) name: &'static str,
    /// Clones the field value out, type-erased. `None` persists as null.
    pub(crate) get: Box<dyn Fn(&dyn Any) -> Option<Box<dyn Any>>>,
    /// Writes a resolved value back. `false` means a type mismatch.
    pub(crate) set: Box<dyn Fn(&mut dyn Any, Box<dyn Any>) -> bool>,
}

/// The field-descriptor table for one struct type.
pub(crate) struct StructSchema {
    pub(crate) name: TypeName,
    /// Builds an empty shell for phase-1 allocation.
    pub(crate) make_default: Box<dyn Fn() -> Box<dyn Any>>,
    /// Clones a type-erased value.
    pub(crate) dup: Box<dyn Fn(&dyn Any) -> Option<Box<dyn Any>>>,
    pub(crate) fields: Vec<FieldSchema>,
}

impl StructSchema {
    pub(crate) fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// What the registry knows about one type.
pub(crate) enum TypeKind {
    Leaf(LeafVtable),
    Sequence(SequenceVtable),
    Struct(StructSchema),
}

/// Declares the serializable fields of a struct type `T`.
///
/// Only declared fields are persisted. Three field kinds exist:
/// - [`field`](Self::field): always present, packed by value;
/// - [`optional`](Self::optional): an absent value persists as null (and is
///   dropped);
/// - [`shared`](Self::shared): a dynamic slot holding a [`SharedAny`] cell,
///   deduplicated by identity across the whole snapshot.
pub struct StructSchemaBuilder<T> {
    fields: Vec<FieldSchema>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Default + Clone + 'static> StructSchemaBuilder<T> {
    /// Starts an empty descriptor table for `T`.
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Declares a plain field, packed by value on every pack.
    pub fn field<F: Clone + 'static>(
        mut self,
        name: &'static str,
        get: fn(&T) -> F,
        set: fn(&mut T, F),
    ) -> Self {
        self.fields.push(FieldSchema {
            name,
            get: Box::new(move |any| {
                any.downcast_ref::<T>()
                    .map(|t| Box::new(get(t)) as Box<dyn Any>)
            }),
            set: Box::new(move |any, value| {
                let Some(target) = any.downcast_mut::<T>() else {
                    return false;
                };
                let Some(v) = take_as::<F>(value) else {
                    return false;
                };
                set(target, v);
                true
            }),
        });
        self
    }

    /// Declares a field whose value may be absent; an absent value persists
    /// as null and is dropped from the instance.
    pub fn optional<F: Clone + 'static>(
        mut self,
        name: &'static str,
        get: fn(&T) -> Option<F>,
        set: fn(&mut T, F),
    ) -> Self {
        self.fields.push(FieldSchema {
            name,
            get: Box::new(move |any| {
                any.downcast_ref::<T>()
                    .and_then(|t| get(t).map(|f| Box::new(f) as Box<dyn Any>))
            }),
            set: Box::new(move |any, value| {
                let Some(target) = any.downcast_mut::<T>() else {
                    return false;
                };
                let Some(v) = take_as::<F>(value) else {
                    return false;
                };
                set(target, v);
                true
            }),
        });
        self
    }

    /// Declares a shared dynamic slot.
    ///
    /// The slot holds a [`SharedAny`] cell; the packer deduplicates cells by
    /// identity, and the unpacker hands the arena cell back so every slot
    /// that shared an object before the snapshot shares it after.
    pub fn shared(
        mut self,
        name: &'static str,
        get: fn(&T) -> Option<SharedAny>,
        set: fn(&mut T, SharedAny),
    ) -> Self {
        self.fields.push(FieldSchema {
            name,
            get: Box::new(move |any| {
                any.downcast_ref::<T>()
                    .and_then(|t| get(t).map(|cell| Box::new(cell) as Box<dyn Any>))
            }),
            set: Box::new(move |any, value| {
                let Some(target) = any.downcast_mut::<T>() else {
                    return false;
                };
                // Struct references resolve to an arena cell; a leaf or
                // sequence value arrives plain and gets a cell of its own.
                let cell = match value.downcast::<SharedAny>() {
                    Ok(cell) => *cell,
                    Err(plain) => SharedAny::from_box(plain),
                };
                set(target, cell);
                true
            }),
        });
        self
    }
}

impl<T: Default + Clone + 'static> Default for StructSchemaBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The registry mapping types to their persistence descriptors.
///
/// Also owns the name⇄type maps the unpacker uses to resolve persisted type
/// names back to live types.
pub struct SchemaRegistry {
    kinds: HashMap<TypeId, TypeKind>,
    names: HashMap<TypeId, TypeName>,
    by_name: HashMap<TypeName, TypeId>,
}

impl SchemaRegistry {
    /// A registry pre-loaded with the built-in leaves, the built-in sequence
    /// element types, and the whitelisted math types.
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            kinds: HashMap::new(),
            names: HashMap::new(),
            by_name: HashMap::new(),
        };

        registry.insert::<i64>(TypeKind::Leaf(leaf::<i64>(
            |v, pools| Payload::Int(pools.push_int(*v)),
            |p, pools| match p {
                Payload::Int(i) => pools.int(*i),
                _ => None,
            },
        )));
        registry.insert::<i32>(TypeKind::Leaf(leaf::<i32>(
            |v, pools| Payload::Int(pools.push_int(i64::from(*v))),
            |p, pools| match p {
                // A pool entry outside the narrow range means a corrupt
                // document, not a value to truncate.
                Payload::Int(i) => pools.int(*i).and_then(|v| i32::try_from(v).ok()),
                _ => None,
            },
        )));
        registry.insert::<u32>(TypeKind::Leaf(leaf::<u32>(
            |v, pools| Payload::Int(pools.push_int(i64::from(*v))),
            |p, pools| match p {
                Payload::Int(i) => pools.int(*i).and_then(|v| u32::try_from(v).ok()),
                _ => None,
            },
        )));
        registry.insert::<f64>(TypeKind::Leaf(leaf::<f64>(
            |v, pools| Payload::Float(pools.push_float(*v)),
            |p, pools| match p {
                Payload::Float(i) => pools.float(*i),
                _ => None,
            },
        )));
        registry.insert::<f32>(TypeKind::Leaf(leaf::<f32>(
            |v, pools| Payload::Float(pools.push_float(f64::from(*v))),
            |p, pools| match p {
                Payload::Float(i) => pools.float(*i).map(|v| v as f32),
                _ => None,
            },
        )));
        registry.insert::<bool>(TypeKind::Leaf(leaf::<bool>(
            |v, pools| Payload::Bool(pools.push_bool(*v)),
            |p, pools| match p {
                Payload::Bool(i) => pools.bool(*i),
                _ => None,
            },
        )));
        registry.insert::<String>(TypeKind::Leaf(leaf::<String>(
            |v, pools| Payload::Str(pools.push_string(v.clone())),
            |p, pools| match p {
                Payload::Str(i) => pools.string(*i).map(str::to_string),
                _ => None,
            },
        )));
        registry.insert::<HostHandle>(TypeKind::Leaf(leaf::<HostHandle>(
            |v, pools| Payload::External(pools.push_external(*v)),
            |p, pools| match p {
                Payload::External(i) => pools.external(*i),
                _ => None,
            },
        )));

        registry.register_sequence::<i32>();
        registry.register_sequence::<i64>();
        registry.register_sequence::<u32>();
        registry.register_sequence::<f32>();
        registry.register_sequence::<f64>();
        registry.register_sequence::<bool>();
        registry.register_sequence::<String>();
        registry.register_sequence::<SharedAny>();

        registry.register_struct(
            StructSchemaBuilder::<Vec3>::new()
                .field("x", |v| v.x, |v, x| v.x = x)
                .field("y", |v| v.y, |v, y| v.y = y)
                .field("z", |v| v.z, |v, z| v.z = z),
        );

        registry
    }

    /// Registers a struct type from its field-descriptor table.
    ///
    /// Registration is what marks the type serializable; re-registering a
    /// type replaces its previous table.
    pub fn register_struct<T: Default + Clone + 'static>(
        &mut self,
        builder: StructSchemaBuilder<T>,
    ) {
        let name = TypeName::of::<T>();
        self.insert::<T>(TypeKind::Struct(StructSchema {
            name,
            make_default: Box::new(|| Box::new(T::default())),
            dup: Box::new(|any| {
                any.downcast_ref::<T>()
                    .map(|t| Box::new(t.clone()) as Box<dyn Any>)
            }),
            fields: builder.fields,
        }));
    }

    /// Registers sequence containers over an element type: `Vec<T>`
    /// (growable) and `Box<[T]>` (fixed-size).
    pub fn register_sequence<T: Clone + Default + 'static>(&mut self) {
        self.insert::<Vec<T>>(TypeKind::Sequence(SequenceVtable {
            iterate: Box::new(|any| {
                any.downcast_ref::<Vec<T>>().map(|v| {
                    v.iter()
                        .map(|e| Box::new(e.clone()) as Box<dyn Any>)
                        .collect()
                })
            }),
            rebuild: Box::new(|elements| {
                rebuild_elements::<T>(elements).map(|v| Box::new(v) as Box<dyn Any>)
            }),
        }));
        self.insert::<Box<[T]>>(TypeKind::Sequence(SequenceVtable {
            iterate: Box::new(|any| {
                any.downcast_ref::<Box<[T]>>().map(|v| {
                    v.iter()
                        .map(|e| Box::new(e.clone()) as Box<dyn Any>)
                        .collect()
                })
            }),
            rebuild: Box::new(|elements| {
                rebuild_elements::<T>(elements)
                    .map(|v| Box::new(v.into_boxed_slice()) as Box<dyn Any>)
            }),
        }));
    }

    fn insert<T: 'static>(&mut self, kind: TypeKind) {
        let ty = TypeId::of::<T>();
        let name = TypeName::of::<T>();
        self.kinds.insert(ty, kind);
        self.names.insert(ty, name.clone());
        self.by_name.insert(name, ty);
    }

    pub(crate) fn kind(&self, ty: TypeId) -> Option<&TypeKind> {
        self.kinds.get(&ty)
    }

    pub(crate) fn name(&self, ty: TypeId) -> Option<&TypeName> {
        self.names.get(&ty)
    }

    /// Resolves a persisted type name back to a live type.
    pub(crate) fn type_by_name(&self, name: &TypeName) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// Returns `true` if `ty` is registered as a struct.
    pub fn is_struct(&self, ty: TypeId) -> bool {
        matches!(self.kinds.get(&ty), Some(TypeKind::Struct(_)))
    }
}

/// Builds a leaf vtable from typed store/load functions.
fn leaf<T: Clone + 'static>(
    store: fn(&T, &mut ValuePools) -> Payload,
    load: fn(&Payload, &ValuePools) -> Option<T>,
) -> LeafVtable {
    LeafVtable {
        store: Box::new(move |any, pools| any.downcast_ref::<T>().map(|v| store(v, pools))),
        load: Box::new(move |payload, pools| {
            load(payload, pools).map(|v| Box::new(v) as Box<dyn Any>)
        }),
        dup: Box::new(|any| {
            any.downcast_ref::<T>()
                .map(|v| Box::new(v.clone()) as Box<dyn Any>)
        }),
    }
}

/// Recovers a `Vec<T>` from resolved sequence elements. Missing elements
/// fall back to `T::default()`; a mistyped element aborts the rebuild.
fn rebuild_elements<T: Clone + Default + 'static>(
    elements: Vec<Option<Box<dyn Any>>>,
) -> Option<Vec<T>> {
    let mut out = Vec::with_capacity(elements.len());
    for element in elements {
        match element {
            Some(boxed) => out.push(take_as::<T>(boxed)?),
            None => out.push(T::default()),
        }
    }
    Some(out)
}
