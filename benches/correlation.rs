//! Command correlation benchmark suite.
//!
//! Measures round-trip latency of commands over a loopback WebSocket
//! endpoint that answers every frame immediately:
//! - Concurrency: 1, 16, 64 in-flight commands
//!
//! Run with: cargo bench --bench correlation
//! Results saved to: target/criterion/

use std::net::SocketAddr;
use std::time::Duration;

use cdp_runtime::Connection;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use futures_util::future::join_all;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const CONCURRENCY: &[usize] = &[1, 16, 64];

// ============================================================================
// Echo Endpoint
// ============================================================================

/// Binds a loopback endpoint that replies `{}` to every command.
async fn spawn_echo_endpoint() -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    let Message::Text(text) = message else {
                        continue;
                    };
                    let Ok(frame) = serde_json::from_str::<Value>(text.as_str()) else {
                        continue;
                    };
                    let reply = json!({"id": frame["id"], "result": {}});
                    if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    Ok(addr)
}

// ============================================================================
// Benchmark: Concurrent Round Trips
// ============================================================================

fn bench_round_trips(c: &mut Criterion) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let rt = Runtime::new().unwrap();
    let connection = rt.block_on(async {
        let addr = spawn_echo_endpoint().await.unwrap();
        Connection::connect(format!("ws://{addr}/devtools/browser/bench"))
            .await
            .unwrap()
    });

    let mut group = c.benchmark_group("round_trips");
    group.measurement_time(Duration::from_secs(10));

    for &count in CONCURRENCY {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("concurrent", count), &count, |b, &n| {
            b.to_async(&rt).iter(|| {
                let connection = connection.clone();
                async move {
                    let calls = (0..n).map(|_| connection.call_raw("Runtime.enable", None));
                    for result in join_all(calls).await {
                        result.unwrap();
                    }
                }
            });
        });
    }

    group.finish();
    rt.block_on(connection.close());
}

criterion_group!(benches, bench_round_trips);
criterion_main!(benches);
