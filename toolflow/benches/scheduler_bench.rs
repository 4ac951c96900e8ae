//! Benchmarks for batch scheduling and raw call parsing.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::time::Duration;
use toolflow::prelude::*;
use toolflow::testing::MockTool;

fn registry() -> Arc<ToolRegistry> {
    Arc::new(ToolRegistry::new().with_tool(Arc::new(MockTool::new("list_dir", ToolKind::Read))))
}

fn requests(n: usize) -> Vec<ToolCallRequest> {
    (0..n)
        .map(|i| ToolCallRequest::with_call_id(format!("call-{i}"), "list_dir", serde_json::json!({"path": "."})))
        .collect()
}

fn batch_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let orchestrator = runtime.block_on(async {
        ToolCallOrchestrator::with_registry(registry(), ApprovalPolicy::default())
    });

    let mut group = c.benchmark_group("schedule_batch");
    for size in [1usize, 8, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                runtime.block_on(async {
                    let channel = Arc::new(CollectingChannel::new());
                    orchestrator
                        .schedule_batch(requests(size), &CancellationToken::shared(), channel.clone())
                        .unwrap();
                    let done = channel
                        .wait_for(
                            |events| events.iter().any(|e| e.event_type() == "batch.complete"),
                            Duration::from_secs(5),
                        )
                        .await;
                    black_box(done)
                })
            });
        });
    }
    group.finish();
}

fn parse_benchmark(c: &mut Criterion) {
    let raw: Vec<serde_json::Value> = (0..32)
        .map(|i| {
            serde_json::json!({
                "id": format!("call-{i}"),
                "function": {"name": "list_dir", "arguments": "{\"path\": \".\"}"}
            })
        })
        .collect();
    let format = CallFormat::openai();

    c.bench_function("parse_tool_calls_32", |b| {
        b.iter(|| black_box(parse_tool_calls(black_box(&raw), &format)))
    });
}

criterion_group!(benches, batch_benchmark, parse_benchmark);
criterion_main!(benches);
