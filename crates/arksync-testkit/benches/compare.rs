use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use arksync_core::{compare, FileEntry, RepositoryIndex};
use arksync_sync::{RelocationSyncMode, SyncDiscovery};

/// `files` entries over `files / 4` distinct contents; `other` renames every
/// tenth path so relocations are part of the workload.
fn indexes(files: usize) -> (RepositoryIndex, RepositoryIndex) {
    let entry = |path: String, i: usize| {
        let contents = format!("content-{}", i % (files / 4).max(1));
        FileEntry::from_contents(path, contents.as_bytes())
    };

    let base = (0..files).map(|i| entry(format!("dir{}/file{i}.jpg", i % 16), i));
    let other = (0..files).map(|i| {
        let path = if i % 10 == 0 {
            format!("moved/file{i}.jpg")
        } else {
            format!("dir{}/file{i}.jpg", i % 16)
        };
        entry(path, i)
    });

    (
        RepositoryIndex::new(base).unwrap_or_default(),
        RepositoryIndex::new(other).unwrap_or_default(),
    )
}

fn bench_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare");
    for files in [100, 1_000, 10_000] {
        let (base, other) = indexes(files);
        group.bench_with_input(BenchmarkId::from_parameter(files), &files, |b, _| {
            b.iter(|| compare(black_box(&base), black_box(&other)))
        });
    }
    group.finish();
}

fn bench_discovery(c: &mut Criterion) {
    let (base, other) = indexes(10_000);
    let comparison = compare(&base, &other);
    let discovery = SyncDiscovery::new(RelocationSyncMode::move_all());

    c.bench_function("discovery/10000", |b| {
        b.iter(|| discovery.prepare_from_comparison(black_box(comparison.clone())))
    });
}

criterion_group!(benches, bench_compare, bench_discovery);
criterion_main!(benches);
