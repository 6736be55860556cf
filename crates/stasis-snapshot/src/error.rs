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

//! Error types for snapshot pack and unpack passes.

use std::fmt;

use stasis_core::ecs::StoreError;

/// A fatal error raised while packing or unpacking a snapshot.
///
/// Non-fatal conditions (a field shape the packer does not recognize, a
/// component type without a schema) never surface here; they degrade to a
/// dropped value plus a `log::warn!` where the policy calls for one.
#[derive(Debug)]
pub enum SnapshotError {
    /// A persisted type name could not be resolved against the current
    /// schema and converter registries.
    TypeResolution {
        /// The module segment of the unresolvable name.
        module: String,
        /// The qualified type path of the unresolvable name.
        name: String,
    },
    /// A persisted property names a field the resolved type no longer has.
    FieldResolution {
        /// The owning type's qualified name.
        ty: String,
        /// The missing field name.
        field: String,
    },
    /// The packer met a shape it refuses to persist (a sequence nested
    /// directly inside another sequence).
    UnsupportedShape {
        /// The offending type's qualified name.
        ty: String,
    },
    /// The document is internally inconsistent: a pool or instance index out
    /// of range, an instance whose type is not a struct, a value that does
    /// not downcast to what its type table entry promises.
    Corrupt(String),
    /// The state store rejected an entity create or component attach.
    Store(StoreError),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::TypeResolution { module, name } => {
                write!(f, "cannot resolve persisted type '{name}' (module '{module}')")
            }
            SnapshotError::FieldResolution { ty, field } => {
                write!(f, "type '{ty}' has no field named '{field}'")
            }
            SnapshotError::UnsupportedShape { ty } => {
                write!(f, "cannot persist '{ty}': sequences of sequences are not supported")
            }
            SnapshotError::Corrupt(detail) => {
                write!(f, "snapshot document is corrupt: {detail}")
            }
            SnapshotError::Store(err) => {
                write!(f, "state store rejected the operation: {err}")
            }
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SnapshotError::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for SnapshotError {
    fn from(err: StoreError) -> Self {
        SnapshotError::Store(err)
    }
}
