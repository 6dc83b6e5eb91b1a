//! Parser throughput benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use garnet_par::Parser;
use garnet_util::Handler;

fn parse_source(source: &[u8]) -> bool {
    let handler = Handler::new();
    let mut parser = Parser::new(source, &handler);
    let root = parser.parse();
    root.span.end as usize <= source.len()
}

fn bench_parser(c: &mut Criterion) {
    let expressions = b"total = total + price * quantity - discount\n".repeat(200);
    let methods = b"def handle(request, timeout = 30, **options)\n  result = request.process(timeout)\n  result || default\nend\n"
        .repeat(100);
    let literals = b"CONFIG = { name: \"app #{env}\", tags: %w[web api], pattern: /(?<id>\\d+)/ }\n".repeat(100);

    c.bench_function("parse_expressions", |b| {
        b.iter(|| parse_source(black_box(&expressions)))
    });
    c.bench_function("parse_method_definitions", |b| {
        b.iter(|| parse_source(black_box(&methods)))
    });
    c.bench_function("parse_literals", |b| {
        b.iter(|| parse_source(black_box(&literals)))
    });
}

criterion_group!(benches, bench_parser);
criterion_main!(benches);
