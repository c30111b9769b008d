// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for request correlation and script rendering in the
// inkbridge-bridge crate.

use std::time::Duration;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use inkbridge_bridge::envelope::ContentCall;
use inkbridge_bridge::router::RequestRouter;
use inkbridge_bridge::script::render;
use inkbridge_core::types::{CorrelationMode, ScriptStyle};

const CHANNEL: &str = "fetchDocOnNetworkReconnect";

/// A fetched Quill document of roughly `paragraphs` lines.
fn fetched_payload(paragraphs: usize) -> String {
    let ops: Vec<serde_json::Value> = (0..paragraphs)
        .map(|i| serde_json::json!({ "insert": format!("paragraph {i} of the fetched document\n") }))
        .collect();
    serde_json::json!({ "content": { "ops": ops }, "timestamp": -1 }).to_string()
}

fn bench_correlation(c: &mut Criterion) {
    let router = RequestRouter::new(CorrelationMode::ById, Duration::from_secs(10));
    let payload = fetched_payload(8);

    c.bench_function("router_begin_resolve", |b| {
        b.iter(|| {
            let call = router.begin(CHANNEL).expect("router open");
            let id = call.id();
            black_box(router.resolve(CHANNEL, Some(id), payload.clone()));
        })
    });

    // 64 calls outstanding: id-less legacy replies have to scan the channel.
    let _parked: Vec<_> = (0..64)
        .map(|i| router.begin(&format!("channel-{i}")).expect("router open"))
        .collect();
    c.bench_function("router_begin_resolve_with_64_outstanding", |b| {
        b.iter(|| {
            let _call = router.begin(CHANNEL).expect("router open");
            black_box(router.resolve(CHANNEL, None, payload.clone()));
        })
    });
}

fn bench_render(c: &mut Criterion) {
    let small = ContentCall::hook_response(CHANNEL, None, fetched_payload(1));
    let large = ContentCall::hook_response(CHANNEL, None, fetched_payload(500));

    c.bench_function("render_legacy_small", |b| {
        b.iter(|| black_box(render(black_box(&small), ScriptStyle::LegacyGlobals)))
    });
    c.bench_function("render_legacy_500_paragraphs", |b| {
        b.iter(|| black_box(render(black_box(&large), ScriptStyle::LegacyGlobals)))
    });
    c.bench_function("render_envelope_500_paragraphs", |b| {
        b.iter(|| black_box(render(black_box(&large), ScriptStyle::Envelope)))
    });
}

criterion_group!(benches, bench_correlation, bench_render);
criterion_main!(benches);
