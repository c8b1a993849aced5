//! Criterion benchmarks for capture and install over a synthetic level.
//!
//! The level is built in memory, so runs are deterministic.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use qs_common::StableId;
use qs_config::Settings;
use qs_core::copy::FactoryTable;
use qs_core::graph::{Node, NodeKind, Sequence, Tags, TypeRegistry, TypeSchema, Value};
use qs_core::lifecycle::{Orchestrator, Snapshot};
use qs_core::world::World;

fn make_world(entities: u32) -> World {
    let mut types = TypeRegistry::new();
    types
        .register(TypeSchema::new("Level", NodeKind::Root).simple("time"))
        .unwrap();
    types
        .register(
            TypeSchema::new("Block", NodeKind::Entity)
                .simple("x")
                .simple("y")
                .reference("next")
                .list_of_complex("links"),
        )
        .unwrap();

    let mut world = World::new(types, FactoryTable::new());
    world.set_root(Node::new("Level", NodeKind::Root).with("time", Value::int(0)));

    let mut keys = Vec::with_capacity(entities as usize);
    for i in 0..entities {
        let tags = Tags {
            player: i == 0,
            ..Tags::default()
        };
        let key = world.spawn(
            Node::new("Block", NodeKind::Entity)
                .with_id(StableId::new("bench", i))
                .with_tags(tags)
                .with("x", Value::float(i as f64))
                .with("y", Value::float(0.0)),
        );
        keys.push(key);
    }

    // Ring of `next` references plus a few shared link lists.
    for (i, key) in keys.iter().enumerate() {
        let next = keys[(i + 1) % keys.len()];
        world.graph.set_member(*key, "next", Value::Node(next));
        let links = Sequence::list(vec![Value::Node(keys[0]), Value::Node(next)]);
        world.graph.set_member(*key, "links", Value::Seq(links));
    }
    world
}

fn bench_capture(c: &mut Criterion) {
    let world = make_world(2_000);
    let root = world.root().unwrap();
    let entities = world.graph.entities().to_vec();

    let mut group = c.benchmark_group("copy_throughput");
    group.bench_function("capture_2k", |b| {
        b.iter(|| {
            let snapshot = Snapshot::take(black_box(&world), root, entities.clone()).unwrap();
            black_box(snapshot.graph.len());
        })
    });
    group.finish();
}

fn bench_install(c: &mut Criterion) {
    let mut world = make_world(2_000);
    let mut orch = Orchestrator::new(Settings {
        transition_ticks: 1,
        ..Settings::default()
    });
    assert!(orch.capture(&mut world));
    orch.update(&mut world);

    let mut group = c.benchmark_group("copy_throughput");
    group.bench_function("install_2k_reuse", |b| {
        b.iter(|| {
            let ok = orch.install(black_box(&mut world));
            orch.update(&mut world);
            black_box(ok);
        })
    });
    group.finish();
}

criterion_group!(benches, bench_capture, bench_install);
criterion_main!(benches);
