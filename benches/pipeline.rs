use criterion::*;
use seanode::driver::{compile_script, PipelineOptions};

fn pipeline_throughput(c: &mut Criterion) {
    let null_checks = ("Null Checks", &std::fs::read_to_string("./demos/null_checks.sea").expect("error reading file"));
    let loops = ("Loops", &std::fs::read_to_string("./demos/loops.sea").expect("error reading file"));
    let branches = ("Branches", &std::fs::read_to_string("./demos/branches.sea").expect("error reading file"));

    let mut group = c.benchmark_group("Pipeline Throughput");
    for (name, input) in [null_checks, loops, branches].into_iter() {
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(format!(" {}", name), input, move |b, input| {
            b.iter(|| compile_script(input, None, PipelineOptions::default()).expect("demo compiles"))
        });
    }
    group.finish();
}

criterion_group!(benches, pipeline_throughput);
criterion_main!(benches);
