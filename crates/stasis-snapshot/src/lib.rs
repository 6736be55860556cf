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

//! # Stasis Snapshot
//!
//! An object-graph snapshot engine for hot-reloading entity/component state.
//!
//! The engine packs every live world of a [`StateStore`] into a pure-data
//! [`StateSnapshot`]: scalar values land in typed pools, struct values
//! become instances addressed by 1-based ids, shared cells deduplicate by
//! identity (cycles included), and live entity handles are translated into
//! snapshot-local packed ids. Unpacking rebuilds the graph two-phase into a
//! fresh store and re-points registered host objects at the restored state.
//!
//! Types participate by explicit registration: struct layouts through
//! [`StructSchemaBuilder`], scalar proxies through converters. There is no
//! runtime reflection and no global state; an engine instance owns its
//! registries and every pass threads its context explicitly.
//!
//! [`StateStore`]: stasis_core::ecs::StateStore

pub mod catalog;
pub mod convert;
pub mod document;
pub mod engine;
pub mod error;
pub mod pack;
pub mod remap;
pub mod schema;
pub mod unpack;

pub use catalog::TypeCatalog;
pub use convert::{ConverterRegistry, PackContext, UnpackContext};
pub use document::{
    EntityRecord, IncomingLinkRecord, Instance, Payload, Property, RootIndex, SnapshotDocument,
    StateSnapshot, TypeName, TypeRef, Value, ValuePools, WorldRecord,
};
pub use engine::SnapshotEngine;
pub use error::SnapshotError;
pub use pack::GraphPacker;
pub use remap::{EntityKey, EntityRemapper};
pub use schema::{clone_as, take_as, SchemaRegistry, StructSchemaBuilder};
pub use unpack::{GraphUnpacker, UnpackedRoots};

#[cfg(test)]
mod tests;
