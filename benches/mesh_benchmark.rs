// SPDX-FileCopyrightText: 2026 Mesh Stream Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use criterion::{criterion_group, criterion_main, Criterion};
use meshstream::{open, Loader};
use std::io::Write as _;
use std::path::PathBuf;

fn build_ascii_ply(vertex_count: usize) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "meshstream-bench-{}-{vertex_count}.ply",
        std::process::id()
    ));
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "ply").unwrap();
    writeln!(file, "format ascii 1.0").unwrap();
    writeln!(file, "element vertex {vertex_count}").unwrap();
    writeln!(file, "property float x").unwrap();
    writeln!(file, "property float y").unwrap();
    writeln!(file, "property float z").unwrap();
    writeln!(file, "element face {}", vertex_count / 3).unwrap();
    writeln!(file, "property list uchar int vertex_indices").unwrap();
    writeln!(file, "end_header").unwrap();
    for i in 0..vertex_count {
        writeln!(file, "{i} {i} {i}").unwrap();
    }
    for face in 0..(vertex_count / 3) {
        let base = face * 3;
        writeln!(file, "3 {} {} {}", base, base + 1, base + 2).unwrap();
    }
    path
}

fn decode_all_chunks(path: &std::path::Path) {
    let mut loader = open(path).unwrap();
    let mut iterator = loader.load().unwrap();
    while iterator.next().unwrap().is_some() {}
}

fn bench_ply_decode(c: &mut Criterion) {
    let path = build_ascii_ply(30_000);
    c.bench_function("ply_ascii_decode_30k_vertices", |b| {
        b.iter(|| decode_all_chunks(&path));
    });
    std::fs::remove_file(&path).ok();
}

criterion_group!(benches, bench_ply_decode);
criterion_main!(benches);
