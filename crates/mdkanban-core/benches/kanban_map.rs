#![allow(missing_docs)]

use std::path::Path;

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use mdkanban_core::{StatusTag, Task, create_kanban_map, parse_task_line};

fn statuses() -> Vec<StatusTag> {
    vec![
        StatusTag::new("backlog", "Backlog", false),
        StatusTag::new("doing", "Doing", false),
        StatusTag::new("done-soon", "Scheduled", true),
    ]
}

fn build_tasks(count: usize) -> Vec<Task> {
    let tags = ["#backlog", "#doing", "#done-soon", "#unrelated"];
    (0..count)
        .filter_map(|idx| {
            let tag = tags[idx % tags.len()];
            // Every third task has no position so the upsert path runs too.
            let raw = if idx % 3 == 0 {
                format!("- [ ] task {idx} {tag} @due(2022-01-{:02})", idx % 28 + 1)
            } else {
                format!("- [ ] task {idx} {tag} [pos:: {}]", count - idx)
            };
            parse_task_line(Path::new("bench.md"), idx, &raw).ok()
        })
        .collect()
}

fn kanban_map_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_kanban_map");
    let statuses = statuses();
    for &count in &[16usize, 128, 1024, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter_batched(
                || build_tasks(count),
                |tasks| {
                    black_box(create_kanban_map(&tasks, &statuses));
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, kanban_map_benchmark);
criterion_main!(benches);
