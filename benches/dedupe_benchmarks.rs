use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sjis_dedupe::decode::{decode_bytes, DEFAULT_CANDIDATES};
use sjis_dedupe::dedupe::{dedupe_rows, parse_rows};
use sjis_dedupe::encode::OutputEncoding;

// Helper to build a CSV with roughly half duplicate rows
fn build_csv(rows: usize) -> String {
    let mut text = String::from("コード,商品名,価格\r\n");
    for i in 0..rows {
        let id = i % (rows / 2).max(1);
        text.push_str(&format!("{id},\"商品 {id}, 標準\",{}\r\n", id * 10));
    }
    text
}

// 1. Decoding Benchmarks
fn bench_decode(c: &mut Criterion) {
    let bytes = OutputEncoding::from_label("shift_jis")
        .unwrap()
        .encode(&build_csv(10_000))
        .unwrap();

    c.bench_function("decode_10k_rows", |b| {
        b.iter(|| black_box(decode_bytes(&bytes, DEFAULT_CANDIDATES).unwrap()))
    });
}

// 2. Parse + Dedupe Benchmarks
fn bench_dedupe(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedupe");
    for rows in [1_000, 10_000, 100_000] {
        let text = build_csv(rows);
        group.bench_function(format!("parse_and_dedupe_{rows}"), |b| {
            b.iter(|| {
                let parsed = parse_rows(&text).unwrap();
                black_box(dedupe_rows(parsed))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decode, bench_dedupe);
criterion_main!(benches);
