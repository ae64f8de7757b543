mod common;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use kalc::{codegen, ir};

fn bench_codegen(c: &mut Criterion) {
    for (label, path) in common::workloads() {
        let program = common::load_program(&path);
        let module = codegen::generate(&program).expect("generate");

        c.bench_function(&format!("codegen_generate_{label}"), |b| {
            b.iter(|| {
                let out = codegen::generate(black_box(&program)).expect("generate");
                black_box(out);
            })
        });

        c.bench_function(&format!("codegen_verify_{label}"), |b| {
            b.iter(|| {
                ir::verify_module(black_box(&module)).expect("verify");
            })
        });

        c.bench_function(&format!("codegen_dump_{label}"), |b| {
            b.iter(|| black_box(module.to_string()))
        });
    }
}

criterion_group!(benches, bench_codegen);
criterion_main!(benches);
