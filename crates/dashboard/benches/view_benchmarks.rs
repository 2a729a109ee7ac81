use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use ironqueue_core::{Job, JobId, JobStatus};
use ironqueue_dashboard::{JobStore, Snapshot, StatusFilter, ViewMemo, derive_view};

const TYPES: [&str; 4] = ["email-send", "image-process", "report", "webhook"];

fn jobs(n: usize) -> Vec<Job> {
    (1..=n as i64)
        .map(|id| Job {
            status: JobStatus::KNOWN[id as usize % 4].clone(),
            attempts: (id % 3) as u32,
            ..Job::queued(JobId::new(id), TYPES[id as usize % TYPES.len()], None, 3, Utc::now())
        })
        .collect()
}

/// Full derivation: counts plus query and status filtering.
fn bench_derive_view(c: &mut Criterion) {
    let mut group = c.benchmark_group("derive_view");

    for size in [100usize, 1_000, 10_000] {
        let data = jobs(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("no_filter", size), &data, |b, data| {
            b.iter(|| derive_view(black_box(data), "", &StatusFilter::All));
        });

        let running = StatusFilter::Only(JobStatus::Running);
        group.bench_with_input(BenchmarkId::new("query_and_status", size), &data, |b, data| {
            b.iter(|| derive_view(black_box(data), "email", &running));
        });
    }

    group.finish();
}

/// Snapshot merge of an unchanged list (the steady state between job updates).
fn bench_snapshot_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("replace_snapshot");

    for size in [1_000usize, 10_000] {
        let data = jobs(size);
        let store = JobStore::new();
        store.replace_snapshot(Snapshot::full(data.clone()));
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("unchanged", size), &data, |b, data| {
            b.iter(|| store.replace_snapshot(Snapshot::full(black_box(data.clone()))));
        });
    }

    group.finish();
}

/// Memoized view: repeated reads at the same revision must not re-derive.
fn bench_memoized_view(c: &mut Criterion) {
    let store = JobStore::new();
    store.replace_snapshot(Snapshot::full(jobs(10_000)));
    let mut memo = ViewMemo::new();

    c.bench_function("view_memo_hit_10k", |b| {
        b.iter(|| memo.view(&store, black_box("email"), &StatusFilter::All));
    });
}

criterion_group!(benches, bench_derive_view, bench_snapshot_merge, bench_memoized_view);
criterion_main!(benches);
