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

//! The persisted snapshot document model.
//!
//! Everything in this module is pure data: no live handles, no `TypeId`s,
//! nothing process-specific. A document survives any envelope (`serde_json`,
//! `bincode`, ...) and any process restart; only names and pool indices are
//! stored. The engine never touches disk itself.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use stasis_core::HostHandle;

/// An interned index into a document's type-name table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode,
)]
pub struct TypeRef(pub u32);

/// The index of one packed root within a document.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode,
)]
pub struct RootIndex(pub u32);

/// A process-independent type name.
///
/// `module` is the leading path segment (the owning crate, or `core` for
/// primitives); `name` is the full qualified path. The pair must resolve to a
/// registered type at unpack or the pass fails.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode,
)]
pub struct TypeName {
    /// The leading path segment of the qualified name.
    pub module: String,
    /// The full qualified type path.
    pub name: String,
}

impl TypeName {
    /// Derives the persisted name of a compile-time type.
    pub fn of<T: 'static>() -> Self {
        let full = std::any::type_name::<T>();
        let module = match full.split_once("::") {
            Some((first, _)) => first.to_string(),
            None => "core".to_string(),
        };
        Self {
            module,
            name: full.to_string(),
        }
    }
}

/// The typed scalar pools shared by every value in a document.
///
/// Leaf values are stored once in the pool matching their persisted kind and
/// referenced by index; the [`Value`] tree itself never embeds scalars.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct ValuePools {
    /// Integer scalars, widened to `i64`.
    pub ints: Vec<i64>,
    /// Floating-point scalars, widened to `f64`.
    pub floats: Vec<f64>,
    /// Boolean scalars.
    pub bools: Vec<bool>,
    /// String scalars.
    pub strings: Vec<String>,
    /// External references: opaque handles into the host registry.
    pub externals: Vec<HostHandle>,
}

impl ValuePools {
    /// Appends an integer, returning its pool index.
    pub fn push_int(&mut self, value: i64) -> u32 {
        self.ints.push(value);
        self.ints.len() as u32 - 1
    }

    /// Appends a float, returning its pool index.
    pub fn push_float(&mut self, value: f64) -> u32 {
        self.floats.push(value);
        self.floats.len() as u32 - 1
    }

    /// Appends a bool, returning its pool index.
    pub fn push_bool(&mut self, value: bool) -> u32 {
        self.bools.push(value);
        self.bools.len() as u32 - 1
    }

    /// Appends a string, returning its pool index.
    pub fn push_string(&mut self, value: String) -> u32 {
        self.strings.push(value);
        self.strings.len() as u32 - 1
    }

    /// Appends an external handle, returning its pool index.
    pub fn push_external(&mut self, value: HostHandle) -> u32 {
        self.externals.push(value);
        self.externals.len() as u32 - 1
    }

    /// Reads an integer back by pool index.
    pub fn int(&self, index: u32) -> Option<i64> {
        self.ints.get(index as usize).copied()
    }

    /// Reads a float back by pool index.
    pub fn float(&self, index: u32) -> Option<f64> {
        self.floats.get(index as usize).copied()
    }

    /// Reads a bool back by pool index.
    pub fn bool(&self, index: u32) -> Option<bool> {
        self.bools.get(index as usize).copied()
    }

    /// Reads a string back by pool index.
    pub fn string(&self, index: u32) -> Option<&str> {
        self.strings.get(index as usize).map(String::as_str)
    }

    /// Reads an external handle back by pool index.
    pub fn external(&self, index: u32) -> Option<HostHandle> {
        self.externals.get(index as usize).copied()
    }
}

/// The persisted shape of one value slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub enum Payload {
    /// Nothing was persisted for this slot.
    Null,
    /// An index into the integer pool.
    Int(u32),
    /// An index into the float pool.
    Float(u32),
    /// An index into the bool pool.
    Bool(u32),
    /// An index into the string pool.
    Str(u32),
    /// An index into the external-handle pool.
    External(u32),
    /// A 1-based instance id; `0` means "no instance".
    Reference(u32),
    /// An inline list of element values. Elements are never themselves
    /// sequences.
    Sequence(Vec<Value>),
}

/// One persisted value slot.
///
/// `stored` names the post-conversion type the payload was persisted as;
/// `runtime` names the pre-conversion runtime type when a converter was
/// applied (and is `None` otherwise). The unpacker re-applies the converter
/// whenever `runtime` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Value {
    /// The pre-conversion runtime type, when a converter was involved.
    pub runtime: Option<TypeRef>,
    /// The type the payload was actually persisted as.
    pub stored: Option<TypeRef>,
    /// The persisted payload.
    pub payload: Payload,
}

impl Value {
    /// A null slot carrying an optional runtime type hint.
    pub fn null(runtime: Option<TypeRef>) -> Self {
        Self {
            runtime,
            stored: None,
            payload: Payload::Null,
        }
    }

    /// Returns `true` if nothing was persisted in this slot.
    pub fn is_null(&self) -> bool {
        matches!(self.payload, Payload::Null)
    }
}

/// One named field of a packed instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Property {
    /// The field name, as declared in the struct schema.
    pub name: String,
    /// The field's packed value.
    pub value: Value,
}

/// One packed struct instance.
///
/// Ids are 1-based and assigned in allocation order, so a parent always has
/// a smaller id than any instance packed while walking its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Instance {
    /// The 1-based instance id.
    pub id: u32,
    /// The struct type the fields were persisted against.
    pub ty: TypeRef,
    /// The pre-conversion runtime type, when a converter produced this
    /// instance.
    pub runtime_ty: Option<TypeRef>,
    /// The packed fields. Fields whose value packed to null are omitted.
    pub properties: Vec<Property>,
}

/// A complete packed object graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct SnapshotDocument {
    /// The interned type-name table; [`TypeRef`]s index into it.
    pub type_names: Vec<TypeName>,
    /// The shared scalar pools.
    pub pools: ValuePools,
    /// All packed instances, in ascending id order.
    pub instances: Vec<Instance>,
    /// The packed roots, in pack order.
    pub roots: Vec<Value>,
}

/// One entity's packed record: its snapshot-local id and the roots holding
/// its component values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct EntityRecord {
    /// The 1-based packed entity id (global across all worlds).
    pub packed_id: u32,
    /// One packed root per serializable component.
    pub components: Vec<RootIndex>,
}

/// One world's packed records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct WorldRecord {
    /// The world's name.
    pub name: String,
    /// The packed entities, in enumeration order.
    pub entities: Vec<EntityRecord>,
}

/// One host object holding a reference into tracked state.
///
/// The owner itself is not packed; only its handle and the packed value it
/// must be re-pointed at after a rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct IncomingLinkRecord {
    /// The handle of the host object owning the link.
    pub owner: HostHandle,
    /// The root holding the packed linked value.
    pub root: RootIndex,
}

/// A full store snapshot: entity topology, the packed object graph, and the
/// incoming links to replay after a rebuild.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct StateSnapshot {
    /// Per-world entity records.
    pub worlds: Vec<WorldRecord>,
    /// The packed component and link values.
    pub objects: SnapshotDocument,
    /// Host objects to re-point at restored state.
    pub links: Vec<IncomingLinkRecord>,
}
