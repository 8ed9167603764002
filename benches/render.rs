use axum::http::Request;
use base_logger::{LoggerConfig, RenderContext, Template, render::Renderer};
use criterion::{Criterion, criterion_group, criterion_main};
use std::{hint::black_box, time::Instant};

fn bench_render(c: &mut Criterion) {
    let config = LoggerConfig::json("bench");

    c.bench_function("compile_default_template", |b| {
        b.iter(|| Template::compile(black_box(&config.format)))
    });

    let template = Template::compile(&config.format).unwrap();
    let renderer = Renderer::new(template, config.custom_time_format.clone(), false);
    let (parts, _) = Request::get("/api/orders?page=2")
        .header("host", "example.com")
        .header("user-agent", "criterion")
        .header("x-request-id", "bench-1")
        .body(())
        .unwrap()
        .into_parts();
    let ctx = RenderContext::new(&parts, Instant::now());

    c.bench_function("render_default_template", |b| {
        b.iter(|| renderer.render(black_box(Some(&ctx))))
    });
}

criterion_group!(benches, bench_render);
criterion_main!(benches);
