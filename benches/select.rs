//! Benchmarks for the selector paths and the generic kernels

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use sparsejit::{
    select_with, BinaryOpcode, Context, Format, IndexUnaryOp, Monoid, SparseMatrix, SystemParameters, UnaryOp,
    UnaryOpcode,
};

/// Generate a sparse matrix with about `per_col` entries in each column
fn generate_sparse_matrix(n: usize, per_col: usize) -> SparseMatrix<f64> {
    let mut col_ptr = vec![0i64];
    let mut row_idx = Vec::new();
    let mut values = Vec::new();

    for j in 0..n {
        let mut rows: Vec<usize> = (0..per_col.min(n)).map(|k| (k * 7 + j * 3) % n).collect();
        rows.sort_unstable();
        rows.dedup();
        for (k, &i) in rows.iter().enumerate() {
            row_idx.push(i as i64);
            values.push(1.0 + (i * k) as f64 * 0.1 - (j % 5) as f64);
        }
        col_ptr.push(row_idx.len() as i64);
    }

    SparseMatrix::from_csc(n, n, col_ptr, row_idx, values).unwrap()
}

fn bench_select_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("select");
    group.sample_size(20);
    let params = SystemParameters::default();

    for &n in &[1_000usize, 10_000] {
        let a = generate_sparse_matrix(n, 16);
        let ops = [
            ("tril", IndexUnaryOp::Tril(0)),
            ("col_le", IndexUnaryOp::ColLe((n / 2) as i64)),
            ("value_gt", IndexUnaryOp::ValueGt(0.0)),
        ];
        for (name, op) in &ops {
            group.bench_with_input(BenchmarkId::new(*name, n), &a, |b, a| {
                b.iter(|| black_box(select_with(a, op, false, &params)))
            });
        }
        // a bitmap holds n * n slots
        if n <= 1_000 {
            let bitmap = a.to_format(Format::Bitmap).unwrap();
            group.bench_with_input(BenchmarkId::new("bitmap_value_gt", n), &bitmap, |b, a| {
                b.iter(|| black_box(select_with(a, &IndexUnaryOp::ValueGt(0.0), false, &params)))
            });
        }
    }
    group.finish();
}

fn bench_generic_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("generic_kernels");
    group.sample_size(20);
    let ctx = Context::generic_only();
    let a = generate_sparse_matrix(10_000, 16);
    let plus = Monoid::builtin(BinaryOpcode::Plus).unwrap();
    let abs = UnaryOp::Builtin(UnaryOpcode::Abs);

    group.bench_function("apply_abs", |b| b.iter(|| black_box(ctx.apply(&a, &abs))));
    group.bench_function("reduce_plus", |b| b.iter(|| black_box(ctx.reduce(&a, &plus))));
    group.finish();
}

criterion_group!(benches, bench_select_paths, bench_generic_kernels);
criterion_main!(benches);
