//! Benchmarks for the differ and keyed reconciler.
//!
//! Run with: cargo bench -p vtree-render --bench diff_bench

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use vtree_render::apply::{apply_patches, render};
use vtree_render::diff::diff;
use vtree_render::events::{Dispatcher, EventNode};
use vtree_render::facts::{Fact, Facts};
use vtree_render::headless::HeadlessDom;
use vtree_render::node::VNode;

fn row(i: usize, label: &str) -> VNode {
    VNode::element(
        "tr",
        Facts::organize([Fact::Attribute {
            name: "class".into(),
            value: if i % 2 == 0 { "even".into() } else { "odd".into() },
        }]),
        vec![
            VNode::element("td", Facts::default(), vec![VNode::text(i.to_string())]),
            VNode::element("td", Facts::default(), vec![VNode::text(label)]),
        ],
    )
}

fn table(rows: usize, label: &str) -> VNode {
    VNode::element("table", Facts::default(), (0..rows).map(|i| row(i, label)).collect())
}

fn keyed_table(order: &[usize]) -> VNode {
    VNode::keyed(
        "tbody",
        Facts::default(),
        order.iter().map(|&i| (format!("r{i}"), row(i, "row"))).collect(),
    )
}

// =============================================================================
// Positional diff
// =============================================================================

fn bench_positional(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff/positional");

    for rows in [100, 1_000] {
        group.throughput(Throughput::Elements(rows as u64));
        let old = table(rows, "a");
        let same = old.deep_clone();
        let changed = table(rows, "b");

        group.bench_with_input(BenchmarkId::new("unchanged", rows), &rows, |b, _| {
            b.iter(|| black_box(diff(&old, &same)))
        });
        group.bench_with_input(BenchmarkId::new("every_label", rows), &rows, |b, _| {
            b.iter(|| black_box(diff(&old, &changed)))
        });
    }

    group.finish();
}

// =============================================================================
// Keyed diff
// =============================================================================

fn bench_keyed(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff/keyed");

    for rows in [100, 1_000] {
        group.throughput(Throughput::Elements(rows as u64));
        let base: Vec<usize> = (0..rows).collect();
        let old = keyed_table(&base);

        let mut swapped = base.clone();
        swapped.swap(1, 2);
        let swapped = keyed_table(&swapped);

        let mut reversed = base.clone();
        reversed.reverse();
        let reversed = keyed_table(&reversed);

        let prepended = keyed_table(&std::iter::once(rows).chain(base.iter().copied()).collect::<Vec<_>>());

        group.bench_with_input(BenchmarkId::new("swap", rows), &rows, |b, _| {
            b.iter(|| black_box(diff(&old, &swapped)))
        });
        group.bench_with_input(BenchmarkId::new("reverse", rows), &rows, |b, _| {
            b.iter(|| black_box(diff(&old, &reversed)))
        });
        group.bench_with_input(BenchmarkId::new("prepend", rows), &rows, |b, _| {
            b.iter(|| black_box(diff(&old, &prepended)))
        });
    }

    group.finish();
}

// =============================================================================
// Full pass against the headless host
// =============================================================================

fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply/headless");

    for rows in [100, 1_000] {
        group.throughput(Throughput::Elements(rows as u64));
        let old = table(rows, "a");
        let new = table(rows, "b");

        group.bench_with_input(BenchmarkId::new("relabel", rows), &rows, |b, _| {
            b.iter_batched(
                || {
                    let mut dom = HeadlessDom::new();
                    let events = EventNode::root(Dispatcher::ignore());
                    let root = render(&mut dom, &old, &events);
                    (dom, root, events)
                },
                |(mut dom, root, events)| {
                    let patches = diff(&old, &new);
                    black_box(apply_patches(&mut dom, root, &old, patches, &events))
                },
                criterion::BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_positional, bench_keyed, bench_apply);
criterion_main!(benches);
