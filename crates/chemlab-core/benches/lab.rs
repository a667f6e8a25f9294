use chemlab_core::prelude::*;
use chemlab_logic::reactions::canonical_key;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bundled_catalog() -> LabCatalog {
    LabCatalog::from_json(
        include_str!("../../../data/chemicals.json"),
        include_str!("../../../data/equipment.json"),
        include_str!("../../../data/reactions.json"),
    )
    .expect("bundled catalog")
}

fn busy_lab() -> LabEngine {
    let mut lab = LabEngine::new(bundled_catalog());
    let chemicals = lab.catalog().chemicals.chemicals.clone();
    lab.place_apparatus("stirrer", 0.0, 0.0);
    for i in 0..6 {
        let beaker = lab.place_apparatus("beaker", 40.0 * i as f32, 100.0);
        for spec in chemicals.iter().skip(i).take(2) {
            lab.add_catalog_chemical(beaker, spec).expect("add");
        }
    }
    lab
}

fn bench_rule_lookup(c: &mut Criterion) {
    let catalog = bundled_catalog();
    let ids = catalog.chemicals.identifiers();

    c.bench_function("rule_lookup_all_pairs", |b| {
        b.iter(|| {
            let mut found = 0;
            for (i, a) in ids.iter().enumerate() {
                for other in &ids[i + 1..] {
                    if catalog.rules.lookup(&canonical_key([other, a])).is_some() {
                        found += 1;
                    }
                }
            }
            black_box(found)
        })
    });
}

fn bench_snapshot_restore(c: &mut Criterion) {
    let mut lab = busy_lab();
    c.bench_function("snapshot", |b| b.iter(|| black_box(lab.snapshot())));

    let snapshot = lab.snapshot();
    c.bench_function("restore", |b| b.iter(|| lab.restore(snapshot.clone())));
}

fn bench_reaction_cycle(c: &mut Criterion) {
    c.bench_function("start_and_complete", |b| {
        b.iter(|| {
            let mut lab = busy_lab();
            for id in lab.bench().container_ids() {
                let _ = lab.start_reaction(id);
            }
            black_box(lab.advance(10_000))
        })
    });
}

criterion_group!(
    benches,
    bench_rule_lookup,
    bench_snapshot_restore,
    bench_reaction_cycle
);
criterion_main!(benches);
