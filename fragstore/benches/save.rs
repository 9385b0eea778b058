//! Microbenchmarks for the fragment save and fetch paths.
//!
//! Run with: `cargo bench -p fragstore -- save`

#![allow(missing_docs, clippy::cast_precision_loss)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use fragstore::{Dataset, Dtype, FragmentData, FragmentGroup, Month};
use tempfile::tempdir;

/// Opens a writeable January 2015 group under a fresh temp directory.
fn setup_group(hashmod: u32) -> (FragmentGroup, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let dataset = Dataset::new(temp_dir.path().join("bench"), hashmod).unwrap();
    let group = dataset.open_month(Month::new(2015, 1).unwrap(), true).unwrap();
    (group, temp_dir)
}

fn bench_save_update(c: &mut Criterion) {
    let (group, _dir) = setup_group(4);
    let mut frag = group.create("bench", "single").unwrap();
    frag.save().unwrap();

    let mut value = 0.0;
    c.bench_function("save/update_single", |b| {
        b.iter(|| {
            value += 1.0;
            frag.set(black_box(7), black_box(value)).unwrap();
            frag.save().unwrap();
        });
    });
}

fn bench_save_batch(c: &mut Criterion) {
    let mut bench_group = c.benchmark_group("save/batch_insert");

    for count in [10usize, 100, 1000] {
        let (group, _dir) = setup_group(16);
        let mut round = 0u32;

        bench_group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                round += 1;
                group.begin().unwrap();
                for i in 0..count {
                    let mut frag = group.create("bench", &format!("r{round}s{i}")).unwrap();
                    frag.set(i % 744, i as f64).unwrap();
                    frag.save().unwrap();
                }
                group.commit().unwrap();
            });
        });
    }

    bench_group.finish();
}

fn bench_fetch(c: &mut Criterion) {
    let (group, _dir) = setup_group(4);
    group.begin().unwrap();
    for i in 0..100 {
        let mut frag = group.create("bench", &format!("s{i}")).unwrap();
        frag.set(i, 1.0).unwrap();
        frag.save().unwrap();
    }
    group.commit().unwrap();

    let mut i = 0usize;
    c.bench_function("fetch/hit", |b| {
        b.iter(|| {
            i = (i + 1) % 100;
            black_box(group.fetch("bench", &format!("s{i}")).unwrap());
        });
    });
}

fn bench_encode(c: &mut Criterion) {
    let mut bench_group = c.benchmark_group("encode/dtype");

    for dtype in [Dtype::F32, Dtype::F64, Dtype::I32, Dtype::I64] {
        let mut data = FragmentData::zeros(dtype, 744);
        for i in (0..744).step_by(3) {
            data.set(i, i as f64).unwrap();
        }
        bench_group.bench_with_input(BenchmarkId::from_parameter(dtype), &data, |b, data| {
            b.iter(|| black_box(data.encode()));
        });
    }

    bench_group.finish();
}

criterion_group!(benches, bench_save_update, bench_save_batch, bench_fetch, bench_encode);
criterion_main!(benches);
