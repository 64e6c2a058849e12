use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use serde_json::{json, Value};
use tk_batch::{apply_unified_diff, deduplicate, unified_diff};

fn generate_reads(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            let body = format!(
                "import os\nimport sys\nfrom typing import Any\nimport mod_{i}\n\ndef f_{i}(x: Any):\n    return x\n"
            );
            json!({"path": format!("pkg/m{i}.py"), "content": body.repeat(4)})
        })
        .collect()
}

fn generate_source(lines: usize) -> String {
    (0..lines).map(|i| format!("let v{i} = {i};")).collect::<Vec<_>>().join("\n")
}

fn bench_dedup(c: &mut Criterion) {
    for &n in &[2usize, 10, 25] {
        let reads = generate_reads(n);
        c.bench_function(&format!("dedup_{n}_reads"), |b| {
            b.iter_batched(
                || reads.clone(),
                |mut r| black_box(deduplicate(&mut r)),
                BatchSize::SmallInput,
            )
        });
    }
}

fn bench_unified_diff(c: &mut Criterion) {
    let old = generate_source(1000);
    let new = old
        .lines()
        .enumerate()
        .map(|(i, l)| if i % 97 == 0 { format!("{l} // changed") } else { l.to_string() })
        .collect::<Vec<_>>()
        .join("\n");
    c.bench_function("unified_diff_1000_lines", |b| {
        b.iter(|| black_box(unified_diff("src/big.rs", black_box(&old), black_box(&new))))
    });

    let patch = unified_diff("src/big.rs", &old, &new);
    c.bench_function("apply_unified_diff_1000_lines", |b| {
        b.iter(|| black_box(apply_unified_diff(black_box(&old), black_box(&patch))))
    });
}

criterion_group!(benches, bench_dedup, bench_unified_diff);
criterion_main!(benches);
