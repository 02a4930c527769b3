//! Benchmark for the config diff engine

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use shared_storage_admin::conf::{generate_conf_diff, split_advanced_settings, ShareConfig};

fn share_conf(fields: usize, advanced: usize, seed: u64) -> ShareConfig {
    let mut conf = ShareConfig::new("bench-share");
    for i in 0..fields {
        conf.fields
            .insert(format!("field-{}", i), format!("value-{}", i + seed as usize));
    }
    for i in 0..advanced {
        conf.advanced_settings
            .push(format!("option{} = {}", i, i as u64 + seed));
    }
    conf
}

fn bench_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("conf_diff");
    group.throughput(Throughput::Elements(1));

    group.bench_function("diff_against_absent_old", |b| {
        let new = share_conf(20, 30, 0);
        b.iter(|| generate_conf_diff(None, black_box(&new)));
    });

    group.bench_function("diff_small_delta", |b| {
        let old = share_conf(20, 30, 0);
        let mut new = old.clone();
        new.fields.insert("field-3".into(), "changed".into());
        new.advanced_settings[7] = "option7 = changed".into();
        b.iter(|| generate_conf_diff(black_box(Some(&old)), black_box(&new)));
    });

    group.finish();
}

fn bench_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("conf_diff");

    let raw = (0..200)
        .map(|i| format!("option{} = {} # comment {}", i, i, i))
        .collect::<Vec<_>>()
        .join("\n");

    group.throughput(Throughput::Elements(200));
    group.bench_function("split_advanced_settings_200_lines", |b| {
        b.iter(|| split_advanced_settings(black_box(&raw)));
    });

    group.finish();
}

criterion_group!(benches, bench_diff, bench_split);
criterion_main!(benches);
