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

//! Type-name interning (pack side) and resolution (unpack side).

use std::any::TypeId;
use std::collections::HashMap;

use crate::convert::ConverterRegistry;
use crate::document::{TypeName, TypeRef};
use crate::error::SnapshotError;
use crate::schema::SchemaRegistry;

/// Builds a document's type-name table, interning each distinct name once.
#[derive(Default)]
pub struct TypeCatalog {
    names: Vec<TypeName>,
    index: HashMap<TypeName, TypeRef>,
}

impl TypeCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a name, returning its stable table index.
    pub fn intern(&mut self, name: &TypeName) -> TypeRef {
        if let Some(existing) = self.index.get(name) {
            return *existing;
        }
        let r = TypeRef(self.names.len() as u32);
        self.names.push(name.clone());
        self.index.insert(name.clone(), r);
        r
    }

    /// Consumes the catalog into the persisted name table.
    pub fn into_names(self) -> Vec<TypeName> {
        self.names
    }

    /// The number of interned names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A persisted name table resolved back to live types.
///
/// Resolution happens once, up front, before any instance is touched; a
/// single unresolvable name fails the whole unpack pass.
pub(crate) struct ResolvedTypes {
    ids: Vec<TypeId>,
}

impl ResolvedTypes {
    /// Resolves every name against the schema registry, falling back to the
    /// converter registry for runtime types that persist through conversion.
    pub(crate) fn resolve(
        names: &[TypeName],
        schema: &SchemaRegistry,
        converters: &ConverterRegistry,
    ) -> Result<Self, SnapshotError> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            let ty = schema
                .type_by_name(name)
                .or_else(|| converters.type_by_name(name))
                .ok_or_else(|| SnapshotError::TypeResolution {
                    module: name.module.clone(),
                    name: name.name.clone(),
                })?;
            ids.push(ty);
        }
        Ok(Self { ids })
    }

    pub(crate) fn get(&self, r: TypeRef) -> Result<TypeId, SnapshotError> {
        self.ids.get(r.0 as usize).copied().ok_or_else(|| {
            SnapshotError::Corrupt(format!("type reference {} out of range", r.0))
        })
    }
}
