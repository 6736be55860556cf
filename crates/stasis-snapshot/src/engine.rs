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

//! The snapshot engine: full-store pack and unpack passes.

use std::any::{Any, TypeId};

use stasis_core::ecs::{EntityRef, StateStore};
use stasis_core::{HostRegistry, SharedAny};

use crate::convert::{ConverterRegistry, PackContext, UnpackContext};
use crate::document::{EntityRecord, IncomingLinkRecord, StateSnapshot, WorldRecord};
use crate::error::SnapshotError;
use crate::pack::GraphPacker;
use crate::remap::EntityRemapper;
use crate::schema::{take_as, SchemaRegistry};
use crate::unpack::GraphUnpacker;

/// One registered incoming-link shape: a host object type that holds a
/// reference into tracked state.
struct IncomingLinkDef {
    owner: TypeId,
    /// Clones the linked value out of an owner, for packing.
    get: Box<dyn Fn(&dyn Any) -> Option<Box<dyn Any>>>,
    /// Points an owner at the restored value.
    set: Box<dyn Fn(&mut dyn Any, Box<dyn Any>) -> bool>,
}

/// The engine orchestrating whole-store snapshots.
///
/// The engine owns the schema and converter registries and the set of
/// registered incoming-link shapes; everything per-pass (the id table, the
/// packer, the unpack arena) is built fresh inside [`pack_state`] and
/// [`unpack_state`] and dropped when the pass ends.
///
/// [`pack_state`]: SnapshotEngine::pack_state
/// [`unpack_state`]: SnapshotEngine::unpack_state
pub struct SnapshotEngine {
    schema: SchemaRegistry,
    converters: ConverterRegistry,
    links: Vec<IncomingLinkDef>,
}

impl SnapshotEngine {
    /// An engine with the built-in schema and the entity-handle converter
    /// pre-registered.
    ///
    /// The entity-handle converter persists an [`EntityRef`] as its packed
    /// id: `0` for an unset or dead handle, otherwise the id table's entry.
    pub fn new() -> Self {
        let schema = SchemaRegistry::with_builtins();
        let mut converters = ConverterRegistry::new();
        converters.register::<EntityRef, u32>(
            |r, ctx| match r.entity {
                Some(id) => ctx.remapper.packed_id(&r.world, id).unwrap_or(0),
                None => 0,
            },
            |packed, ctx| match ctx.remapper.entity(packed) {
                Some(key) => EntityRef::new(key.world.clone(), key.entity),
                None => EntityRef::none(),
            },
        );
        Self {
            schema,
            converters,
            links: Vec::new(),
        }
    }

    /// The engine's schema registry, for registering component structs and
    /// sequence element types.
    pub fn schema_mut(&mut self) -> &mut SchemaRegistry {
        &mut self.schema
    }

    /// Registers a converter. See [`ConverterRegistry::register`].
    pub fn add_converter<R, P>(
        &mut self,
        pack: impl Fn(&R, &PackContext<'_>) -> P + 'static,
        unpack: impl Fn(P, &UnpackContext<'_>) -> R + 'static,
    ) where
        R: Clone + 'static,
        P: Clone + Default + 'static,
    {
        self.converters.register(pack, unpack);
    }

    /// Registers an incoming-link shape.
    ///
    /// Every host-registry object of type `Owner` is scanned at pack time;
    /// its linked value is packed as an extra root and re-applied through
    /// `set` after an unpack. Owners that vanish between the two passes are
    /// skipped with a warning.
    pub fn add_incoming_link<Owner: 'static, S: Clone + 'static>(
        &mut self,
        get: fn(&Owner) -> S,
        set: fn(&mut Owner, S),
    ) {
        self.links.push(IncomingLinkDef {
            owner: TypeId::of::<Owner>(),
            get: Box::new(move |any| {
                any.downcast_ref::<Owner>()
                    .map(|owner| Box::new(get(owner)) as Box<dyn Any>)
            }),
            set: Box::new(move |any, value| {
                let Some(owner) = any.downcast_mut::<Owner>() else {
                    return false;
                };
                let Some(v) = take_as::<S>(value) else {
                    return false;
                };
                set(owner, v);
                true
            }),
        });
    }

    /// Packs the whole store into a snapshot.
    ///
    /// Packed entity ids are assigned up front, globally across all worlds,
    /// so entity-handle fields anywhere in the graph resolve during the
    /// pack. A component value whose type has no registered schema is
    /// dropped with a warning; its entity record is still written.
    pub fn pack_state(
        &self,
        store: &dyn StateStore,
        host: &HostRegistry,
    ) -> Result<StateSnapshot, SnapshotError> {
        let world_names = store.world_names();

        let mut remapper = EntityRemapper::new();
        for name in &world_names {
            for entity in store.live_entities(name) {
                remapper.assign(name, entity);
            }
        }

        let mut packer = GraphPacker::new(&self.schema, &self.converters, &remapper);
        let mut worlds = Vec::with_capacity(world_names.len());
        for name in &world_names {
            let mut entities = Vec::new();
            for entity in store.live_entities(name) {
                let packed_id = remapper.packed_id(name, entity).ok_or_else(|| {
                    SnapshotError::Corrupt("live entity missing from the id table".into())
                })?;
                let mut components = Vec::new();
                for slot in store.component_values(name, entity) {
                    if !self.schema.is_struct((*slot.value).type_id()) {
                        log::warn!(
                            "component '{}' has no registered schema and will not be snapshotted",
                            slot.name
                        );
                        continue;
                    }
                    components.push(packer.pack_root(&*slot.value)?);
                }
                entities.push(EntityRecord {
                    packed_id,
                    components,
                });
            }
            worlds.push(WorldRecord {
                name: name.clone(),
                entities,
            });
        }

        let mut links = Vec::new();
        for def in &self.links {
            for (handle, cell) in host.iter() {
                if cell.type_id_of() != def.owner {
                    continue;
                }
                let linked = {
                    let guard = cell.borrow();
                    (def.get)(&**guard)
                };
                let Some(linked) = linked else {
                    continue;
                };
                let root = packer.pack_root(&*linked)?;
                links.push(IncomingLinkRecord {
                    owner: handle,
                    root,
                });
            }
        }

        Ok(StateSnapshot {
            worlds,
            objects: packer.finish(),
            links,
        })
    }

    /// Restores a snapshot into a store.
    ///
    /// One fresh entity is created per packed record, and the id table is
    /// filled *before* the object graph is rebuilt, so entity-handle fields
    /// resolve to the new handles during the rebuild. On a fatal error the
    /// partially populated store is left as-is.
    pub fn unpack_state(
        &self,
        snapshot: &StateSnapshot,
        store: &mut dyn StateStore,
        host: &HostRegistry,
    ) -> Result<(), SnapshotError> {
        let mut remapper = EntityRemapper::new();
        for world in &snapshot.worlds {
            for record in &world.entities {
                let entity = store.create_entity(&world.name)?;
                remapper.record(record.packed_id, &world.name, entity);
            }
        }

        let unpacker = GraphUnpacker::new(&self.schema, &self.converters, &remapper, &snapshot.objects);
        let mut roots = unpacker.run()?;

        for world in &snapshot.worlds {
            for record in &world.entities {
                let entity = remapper
                    .entity(record.packed_id)
                    .ok_or_else(|| {
                        SnapshotError::Corrupt("packed entity missing from the id table".into())
                    })?
                    .entity;
                for root in &record.components {
                    // A root resolving to nothing means its component type
                    // was dropped; the entity survives without it.
                    let Some((ty, value)) = roots.concrete(*root) else {
                        log::warn!(
                            "component root {} resolved to nothing and was skipped",
                            root.0
                        );
                        continue;
                    };
                    store.attach_component(&world.name, entity, ty, value)?;
                }
            }
        }

        for record in &snapshot.links {
            let Some(cell) = host.get(record.owner) else {
                log::warn!(
                    "incoming-link owner {:?} is no longer registered, skipping",
                    record.owner
                );
                continue;
            };
            let Some((_, value)) = roots.concrete(record.root) else {
                log::warn!(
                    "incoming link for {:?} resolved to nothing, skipping",
                    record.owner
                );
                continue;
            };
            if !self.apply_link(cell, value) {
                log::warn!("incoming link for {:?} could not be re-applied", record.owner);
            }
        }

        Ok(())
    }

    fn apply_link(&self, cell: &SharedAny, value: Box<dyn Any>) -> bool {
        let owner_ty = cell.type_id_of();
        let Some(def) = self.links.iter().find(|d| d.owner == owner_ty) else {
            return false;
        };
        let mut guard = cell.borrow_mut();
        (def.set)(&mut **guard, value)
    }
}

impl Default for SnapshotEngine {
    fn default() -> Self {
        Self::new()
    }
}
