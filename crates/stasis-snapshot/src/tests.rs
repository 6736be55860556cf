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

use stasis_core::math::Vec3;
use stasis_core::SharedAny;

use crate::catalog::TypeCatalog;
use crate::convert::ConverterRegistry;
use crate::document::{Payload, RootIndex, SnapshotDocument, TypeName, TypeRef, Value, ValuePools};
use crate::error::SnapshotError;
use crate::pack::GraphPacker;
use crate::remap::EntityRemapper;
use crate::schema::{clone_as, SchemaRegistry, StructSchemaBuilder};
use crate::unpack::{GraphUnpacker, UnpackedRoots};

use stasis_core::ecs::EntityId;

#[derive(Clone, Default, Debug, PartialEq)]
struct Stats {
    score: i32,
    multiplier: f32,
    label: String,
}

#[derive(Clone, Default, Debug)]
struct Holder {
    slot: Option<SharedAny>,
    other: Option<SharedAny>,
}

#[derive(Clone, Default, Debug)]
struct Node {
    tag: i32,
    next: Option<SharedAny>,
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Bag {
    items: Vec<i32>,
    note: Option<String>,
}

fn test_schema() -> SchemaRegistry {
    let mut schema = SchemaRegistry::with_builtins();
    schema.register_struct(
        StructSchemaBuilder::<Stats>::new()
            .field("score", |s| s.score, |s, v| s.score = v)
            .field("multiplier", |s| s.multiplier, |s, v| s.multiplier = v)
            .field("label", |s| s.label.clone(), |s, v| s.label = v),
    );
    schema.register_struct(
        StructSchemaBuilder::<Holder>::new()
            .shared("slot", |h| h.slot.clone(), |h, v| h.slot = Some(v))
            .shared("other", |h| h.other.clone(), |h, v| h.other = Some(v)),
    );
    schema.register_struct(
        StructSchemaBuilder::<Node>::new()
            .field("tag", |n| n.tag, |n, v| n.tag = v)
            .shared("next", |n| n.next.clone(), |n, v| n.next = Some(v)),
    );
    schema.register_struct(
        StructSchemaBuilder::<Bag>::new()
            .field("items", |b| b.items.clone(), |b, v| b.items = v)
            .optional("note", |b| b.note.clone(), |b, v| b.note = Some(v)),
    );
    schema
}

fn unpack<'a>(
    schema: &'a SchemaRegistry,
    converters: &'a ConverterRegistry,
    remapper: &'a EntityRemapper,
    doc: &'a SnapshotDocument,
) -> UnpackedRoots<'a> {
    GraphUnpacker::new(schema, converters, remapper, doc)
        .run()
        .expect("unpack should succeed")
}

#[test]
fn scalars_round_trip_through_pools() {
    let schema = test_schema();
    let converters = ConverterRegistry::new();
    let remapper = EntityRemapper::new();

    let stats = Stats {
        score: 42,
        multiplier: 1.5,
        label: "alpha".to_string(),
    };

    let mut packer = GraphPacker::new(&schema, &converters, &remapper);
    // Unrelated roots first: nothing may depend on a root being index 0.
    packer.pack_root(&99i64).unwrap();
    packer.pack_root(&true).unwrap();
    let root = packer.pack_root(&stats).unwrap();
    let doc = packer.finish();

    // The document must survive an envelope pass.
    let json = serde_json::to_string(&doc).unwrap();
    let doc: SnapshotDocument = serde_json::from_str(&json).unwrap();

    let mut roots = unpack(&schema, &converters, &remapper, &doc);
    assert_eq!(roots.take::<i64>(RootIndex(0)), Some(99));
    assert_eq!(roots.take::<bool>(RootIndex(1)), Some(true));
    // A struct root resolves through its arena cell; the borrowed view and
    // the taken value agree.
    let view = roots.value(root).unwrap();
    assert_eq!(clone_as::<Stats>(view), Some(stats.clone()));
    assert_eq!(roots.take::<Stats>(root), Some(stats));
}

#[test]
fn null_scalars_dropped_empty_sequences_kept() {
    let schema = test_schema();
    let converters = ConverterRegistry::new();
    let remapper = EntityRemapper::new();

    let bag = Bag {
        items: Vec::new(),
        note: None,
    };
    let mut packer = GraphPacker::new(&schema, &converters, &remapper);
    packer.pack_root(&bag).unwrap();
    let doc = packer.finish();

    assert_eq!(doc.instances.len(), 1);
    let instance = &doc.instances[0];
    // The absent optional vanishes; the empty sequence is real data.
    assert_eq!(instance.properties.len(), 1);
    assert_eq!(instance.properties[0].name, "items");
    assert_eq!(
        instance.properties[0].value.payload,
        Payload::Sequence(Vec::new())
    );

    let mut roots = unpack(&schema, &converters, &remapper, &doc);
    assert_eq!(roots.take::<Bag>(RootIndex(0)), Some(bag));
}

#[test]
fn sequences_round_trip_elementwise() {
    let schema = test_schema();
    let converters = ConverterRegistry::new();
    let remapper = EntityRemapper::new();

    let bag = Bag {
        items: vec![3, 1, 4, 1, 5],
        note: Some("pi".to_string()),
    };
    let mut packer = GraphPacker::new(&schema, &converters, &remapper);
    let root = packer.pack_root(&bag).unwrap();
    let doc = packer.finish();

    let mut roots = unpack(&schema, &converters, &remapper, &doc);
    assert_eq!(roots.take::<Bag>(root), Some(bag));
}

#[test]
fn shared_cells_deduplicate_by_identity() {
    let schema = test_schema();
    let converters = ConverterRegistry::new();
    let remapper = EntityRemapper::new();

    let cell = SharedAny::new(Node {
        tag: 7,
        next: None,
    });
    let holder = Holder {
        slot: Some(cell.clone()),
        other: Some(cell),
    };

    let mut packer = GraphPacker::new(&schema, &converters, &remapper);
    let root = packer.pack_root(&holder).unwrap();
    let doc = packer.finish();

    // One Holder instance plus exactly one Node instance, not two.
    assert_eq!(doc.instances.len(), 2);

    let mut roots = unpack(&schema, &converters, &remapper, &doc);
    let restored = roots.take::<Holder>(root).unwrap();
    let slot = restored.slot.unwrap();
    let other = restored.other.unwrap();
    assert!(slot.ptr_eq(&other));
    assert_eq!(slot.get::<Node>().unwrap().tag, 7);
}

#[test]
fn shared_slots_hold_leaf_values() {
    let schema = test_schema();
    let converters = ConverterRegistry::new();
    let remapper = EntityRemapper::new();

    // A dynamic slot is not restricted to structs; a cell around a plain
    // leaf must survive the round trip.
    let holder = Holder {
        slot: Some(SharedAny::new(String::from("payload"))),
        other: Some(SharedAny::new(vec![1i32, 2, 3])),
    };

    let mut packer = GraphPacker::new(&schema, &converters, &remapper);
    let root = packer.pack_root(&holder).unwrap();
    let doc = packer.finish();

    let mut roots = unpack(&schema, &converters, &remapper, &doc);
    let restored = roots.take::<Holder>(root).unwrap();
    assert_eq!(
        restored.slot.unwrap().get::<String>().as_deref(),
        Some("payload")
    );
    assert_eq!(
        restored.other.unwrap().get::<Vec<i32>>(),
        Some(vec![1, 2, 3])
    );
}

#[test]
fn reference_cycles_terminate_and_rebuild() {
    let schema = test_schema();
    let converters = ConverterRegistry::new();
    let remapper = EntityRemapper::new();

    let a = SharedAny::new(Node { tag: 1, next: None });
    let b = SharedAny::new(Node {
        tag: 2,
        next: Some(a.clone()),
    });
    a.borrow_mut().downcast_mut::<Node>().unwrap().next = Some(b.clone());

    let mut packer = GraphPacker::new(&schema, &converters, &remapper);
    let root = packer.pack_root(&a).unwrap();
    let doc = packer.finish();
    assert_eq!(doc.instances.len(), 2);

    let mut roots = unpack(&schema, &converters, &remapper, &doc);
    let a2 = roots.take::<SharedAny>(root).unwrap();
    let node_a = a2.get::<Node>().unwrap();
    assert_eq!(node_a.tag, 1);
    let b2 = node_a.next.unwrap();
    let node_b = b2.get::<Node>().unwrap();
    assert_eq!(node_b.tag, 2);
    // The cycle closes back onto the same cell, not a copy.
    assert!(node_b.next.unwrap().ptr_eq(&a2));
}

#[test]
fn plain_roots_never_deduplicate() {
    let schema = test_schema();
    let converters = ConverterRegistry::new();
    let remapper = EntityRemapper::new();

    let stats = Stats {
        score: 1,
        multiplier: 1.0,
        label: "x".to_string(),
    };
    let mut packer = GraphPacker::new(&schema, &converters, &remapper);
    packer.pack_root(&stats).unwrap();
    packer.pack_root(&stats).unwrap();
    let doc = packer.finish();

    // Same value, two independent instances.
    assert_eq!(doc.instances.len(), 2);
}

#[test]
fn instance_ids_follow_allocation_order() {
    let schema = test_schema();
    let converters = ConverterRegistry::new();
    let remapper = EntityRemapper::new();

    let holder = Holder {
        slot: Some(SharedAny::new(Node { tag: 5, next: None })),
        other: None,
    };
    let mut packer = GraphPacker::new(&schema, &converters, &remapper);
    packer.pack_root(&holder).unwrap();
    let doc = packer.finish();

    assert_eq!(doc.instances.len(), 2);
    // Parent allocated before its children.
    assert_eq!(doc.instances[0].id, 1);
    assert_eq!(doc.instances[1].id, 2);
    let parent_ty = doc.instances[0].ty;
    assert!(doc.type_names[parent_ty.0 as usize].name.contains("Holder"));
}

#[test]
fn nested_sequences_are_rejected() {
    let mut schema = test_schema();
    schema.register_sequence::<Vec<i32>>();
    let converters = ConverterRegistry::new();
    let remapper = EntityRemapper::new();

    let nested: Vec<Vec<i32>> = vec![vec![1, 2], vec![3]];
    let mut packer = GraphPacker::new(&schema, &converters, &remapper);
    let err = packer.pack_root(&nested).unwrap_err();
    assert!(matches!(err, SnapshotError::UnsupportedShape { .. }));
}

#[test]
fn unregistered_field_shapes_degrade_to_null() {
    #[derive(Clone, Default, Debug)]
    struct Odd {
        weird: std::time::Duration,
        tag: i32,
    }

    let mut schema = test_schema();
    schema.register_struct(
        StructSchemaBuilder::<Odd>::new()
            .field("weird", |o| o.weird, |o, v| o.weird = v)
            .field("tag", |o| o.tag, |o, v| o.tag = v),
    );
    let converters = ConverterRegistry::new();
    let remapper = EntityRemapper::new();

    let odd = Odd {
        weird: std::time::Duration::from_secs(3),
        tag: 9,
    };
    let mut packer = GraphPacker::new(&schema, &converters, &remapper);
    let root = packer.pack_root(&odd).unwrap();
    let doc = packer.finish();

    // The unrecognized field is silently dropped; the rest survives.
    assert_eq!(doc.instances[0].properties.len(), 1);
    assert_eq!(doc.instances[0].properties[0].name, "tag");

    let mut roots = unpack(&schema, &converters, &remapper, &doc);
    let restored = roots.take::<Odd>(root).unwrap();
    assert_eq!(restored.tag, 9);
    assert_eq!(restored.weird, std::time::Duration::default());
}

#[test]
fn unknown_type_name_is_fatal() {
    let schema = test_schema();
    let converters = ConverterRegistry::new();
    let remapper = EntityRemapper::new();

    let doc = SnapshotDocument {
        type_names: vec![TypeName {
            module: "ghost".to_string(),
            name: "ghost::Vanished".to_string(),
        }],
        pools: ValuePools::default(),
        instances: Vec::new(),
        roots: vec![Value {
            runtime: None,
            stored: Some(TypeRef(0)),
            payload: Payload::Int(0),
        }],
    };

    let err = GraphUnpacker::new(&schema, &converters, &remapper, &doc)
        .run()
        .unwrap_err();
    assert!(matches!(err, SnapshotError::TypeResolution { .. }));
}

#[test]
fn missing_field_on_resolved_type_is_fatal() {
    let full = test_schema();
    let converters = ConverterRegistry::new();
    let remapper = EntityRemapper::new();

    let stats = Stats {
        score: 3,
        multiplier: 2.0,
        label: "gone".to_string(),
    };
    let mut packer = GraphPacker::new(&full, &converters, &remapper);
    packer.pack_root(&stats).unwrap();
    let doc = packer.finish();

    // The reloaded code dropped the `score` field.
    let mut reduced = SchemaRegistry::with_builtins();
    reduced.register_struct(
        StructSchemaBuilder::<Stats>::new()
            .field("multiplier", |s| s.multiplier, |s, v| s.multiplier = v)
            .field("label", |s| s.label.clone(), |s, v| s.label = v),
    );

    let err = GraphUnpacker::new(&reduced, &converters, &remapper, &doc)
        .run()
        .unwrap_err();
    assert!(matches!(
        err,
        SnapshotError::FieldResolution { field, .. } if field == "score"
    ));
}

#[test]
fn converters_rewrite_leaves() {
    #[derive(Clone, Debug, PartialEq)]
    struct Temperature {
        celsius: f64,
    }

    let schema = test_schema();
    let mut converters = ConverterRegistry::new();
    converters.register::<Temperature, f64>(
        |t, _| t.celsius,
        |v, _| Temperature { celsius: v },
    );
    let remapper = EntityRemapper::new();

    let mut packer = GraphPacker::new(&schema, &converters, &remapper);
    let root = packer.pack_root(&Temperature { celsius: 21.5 }).unwrap();
    let doc = packer.finish();

    // Persisted as a plain float, with the runtime type recorded.
    assert!(matches!(doc.roots[root.0 as usize].payload, Payload::Float(_)));
    assert!(doc.roots[root.0 as usize].runtime.is_some());

    let mut roots = unpack(&schema, &converters, &remapper, &doc);
    assert_eq!(
        roots.take::<Temperature>(root),
        Some(Temperature { celsius: 21.5 })
    );
}

#[test]
fn converter_reregistration_replaces() {
    #[derive(Clone, Debug, PartialEq)]
    struct Temperature {
        celsius: f64,
    }

    let schema = test_schema();
    let mut converters = ConverterRegistry::new();
    converters.register::<Temperature, f64>(|t, _| t.celsius, |v, _| Temperature { celsius: v });
    // Second registration wins: persists Fahrenheit instead.
    converters.register::<Temperature, f64>(
        |t, _| t.celsius * 9.0 / 5.0 + 32.0,
        |v, _| Temperature {
            celsius: (v - 32.0) * 5.0 / 9.0,
        },
    );
    let remapper = EntityRemapper::new();

    let mut packer = GraphPacker::new(&schema, &converters, &remapper);
    let root = packer.pack_root(&Temperature { celsius: 100.0 }).unwrap();
    let doc = packer.finish();
    assert_eq!(doc.pools.floats[0], 212.0);

    let mut roots = unpack(&schema, &converters, &remapper, &doc);
    assert_eq!(
        roots.take::<Temperature>(root),
        Some(Temperature { celsius: 100.0 })
    );
}

#[test]
fn same_type_converters_invert_on_unpack() {
    let schema = test_schema();
    let mut converters = ConverterRegistry::new();
    // Proxy type equals the runtime type; the inverse must still run.
    converters.register::<f64, f64>(|v, _| v * 2.0, |v, _| v / 2.0);
    let remapper = EntityRemapper::new();

    let mut packer = GraphPacker::new(&schema, &converters, &remapper);
    let root = packer.pack_root(&21.0f64).unwrap();
    let doc = packer.finish();
    assert_eq!(doc.pools.floats[0], 42.0);

    let mut roots = unpack(&schema, &converters, &remapper, &doc);
    assert_eq!(roots.take::<f64>(root), Some(21.0));
}

#[test]
fn null_with_converter_substitutes_zero() {
    #[derive(Clone, Default, Debug, PartialEq)]
    struct Marker(i32);

    let schema = test_schema();
    let mut converters = ConverterRegistry::new();
    converters.register::<Marker, i32>(|m, _| m.0, |v, _| Marker(v));
    let remapper = EntityRemapper::new();

    // A slot that persisted as null but names a converter-bearing runtime
    // type: the converter's zero value is substituted.
    let doc = SnapshotDocument {
        type_names: vec![TypeName::of::<Marker>()],
        pools: ValuePools::default(),
        instances: Vec::new(),
        roots: vec![Value::null(Some(TypeRef(0)))],
    };

    let mut roots = unpack(&schema, &converters, &remapper, &doc);
    assert_eq!(roots.take::<Marker>(RootIndex(0)), Some(Marker(0)));
}

#[test]
fn plain_null_root_resolves_to_nothing() {
    let schema = test_schema();
    let converters = ConverterRegistry::new();
    let remapper = EntityRemapper::new();

    let doc = SnapshotDocument {
        type_names: Vec::new(),
        pools: ValuePools::default(),
        instances: Vec::new(),
        roots: vec![Value::null(None)],
    };

    let mut roots = unpack(&schema, &converters, &remapper, &doc);
    assert_eq!(roots.take::<i32>(RootIndex(0)), None);
    assert!(roots.concrete(RootIndex(0)).is_none());
}

#[test]
fn catalog_interns_each_name_once() {
    let mut catalog = TypeCatalog::new();
    let a = TypeName::of::<i32>();
    let b = TypeName::of::<String>();
    let ra = catalog.intern(&a);
    let rb = catalog.intern(&b);
    assert_ne!(ra, rb);
    assert_eq!(catalog.intern(&a), ra);
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.into_names(), vec![a, b]);
}

#[test]
fn remapper_is_bidirectional() {
    let mut remapper = EntityRemapper::new();
    let e1 = EntityId {
        index: 4,
        generation: 2,
    };
    let e2 = EntityId {
        index: 0,
        generation: 0,
    };

    let id1 = remapper.assign("main", e1);
    let id2 = remapper.assign("other", e2);
    assert_eq!(id1, 1);
    assert_eq!(id2, 2);
    // Re-assigning is idempotent.
    assert_eq!(remapper.assign("main", e1), 1);

    assert_eq!(remapper.packed_id("main", e1), Some(1));
    assert_eq!(remapper.packed_id("other", e1), None);
    assert_eq!(remapper.entity(2).unwrap().world, "other");
    assert_eq!(remapper.entity(2).unwrap().entity, e2);
    // The 0 sentinel never resolves.
    assert_eq!(remapper.entity(0), None);
}

#[test]
fn whitelisted_vectors_pack_structurally() {
    #[derive(Clone, Default, Debug, PartialEq)]
    struct Transform {
        position: Vec3,
        scale: f32,
    }

    let mut schema = test_schema();
    schema.register_struct(
        StructSchemaBuilder::<Transform>::new()
            .field("position", |t| t.position, |t, v| t.position = v)
            .field("scale", |t| t.scale, |t, v| t.scale = v),
    );
    let converters = ConverterRegistry::new();
    let remapper = EntityRemapper::new();

    let transform = Transform {
        position: Vec3::new(1.0, -2.0, 3.5),
        scale: 2.0,
    };
    let mut packer = GraphPacker::new(&schema, &converters, &remapper);
    let root = packer.pack_root(&transform).unwrap();
    let doc = packer.finish();

    // The vector packs as a nested instance, not an opaque blob.
    assert_eq!(doc.instances.len(), 2);

    let mut roots = unpack(&schema, &converters, &remapper, &doc);
    assert_eq!(roots.take::<Transform>(root), Some(transform));
}

#[test]
fn boxed_slices_round_trip() {
    #[derive(Clone, Default, Debug, PartialEq)]
    struct Fixed {
        data: Box<[i32]>,
    }

    let mut schema = test_schema();
    schema.register_struct(StructSchemaBuilder::<Fixed>::new().field(
        "data",
        |f| f.data.clone(),
        |f, v| f.data = v,
    ));
    let converters = ConverterRegistry::new();
    let remapper = EntityRemapper::new();

    let fixed = Fixed {
        data: vec![10, 20, 30].into_boxed_slice(),
    };
    let mut packer = GraphPacker::new(&schema, &converters, &remapper);
    let root = packer.pack_root(&fixed).unwrap();
    let doc = packer.finish();

    let mut roots = unpack(&schema, &converters, &remapper, &doc);
    assert_eq!(roots.take::<Fixed>(root), Some(fixed));
}

#[test]
fn out_of_range_scalars_fail_unpack() {
    let schema = test_schema();
    let converters = ConverterRegistry::new();
    let remapper = EntityRemapper::new();

    // An i64 pool entry far outside i32 range under an i32 stored type.
    let doc = SnapshotDocument {
        type_names: vec![TypeName::of::<i32>()],
        pools: ValuePools {
            ints: vec![i64::MAX],
            ..ValuePools::default()
        },
        instances: Vec::new(),
        roots: vec![Value {
            runtime: None,
            stored: Some(TypeRef(0)),
            payload: Payload::Int(0),
        }],
    };

    let err = GraphUnpacker::new(&schema, &converters, &remapper, &doc)
        .run()
        .unwrap_err();
    assert!(matches!(err, SnapshotError::Corrupt(_)));
}

#[test]
fn pools_round_trip_all_kinds() {
    let mut pools = ValuePools::default();
    let i = pools.push_int(-7);
    let f = pools.push_float(2.25);
    let b = pools.push_bool(true);
    let s = pools.push_string("hi".to_string());

    assert_eq!(pools.int(i), Some(-7));
    assert_eq!(pools.float(f), Some(2.25));
    assert_eq!(pools.bool(b), Some(true));
    assert_eq!(pools.string(s), Some("hi"));
    assert_eq!(pools.int(99), None);
}
