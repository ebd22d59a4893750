use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;
use common::ShutdownMessage;
use proxy::cache::{GetFlags, MemStore, TtlCache};
use proxy::fingerprint::{fingerprint, NaiveTokenClassifier};
use proxy::filter::{Downstream, Filter, RowLimitTransducer, TransducerConfig, Upstream};
use proxy::server::proxy_cli_args::ProxyServerArgs;
use tokio::sync::watch;
use tokio::sync::watch::Receiver;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

async fn shutdown_signal() -> ShutdownMessage {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        v = ctrl_c => ShutdownMessage::Cancel(format!("demo received ctrl_c signal {v:?}")),
        _ = terminate => ShutdownMessage::Cancel("demo received terminate signal".to_string()),
    }
}

/// Logs whatever it's handed instead of forwarding to a real peer: this demo
/// binary has no backend connection, only the filter pipeline.
struct LoggingSink {
    label: &'static str,
}

impl Downstream for LoggingSink {
    fn route(&mut self, packet: &[u8]) -> i32 {
        info!(label = self.label, bytes = packet.len(), "routed request");
        1
    }
}

impl Upstream for LoggingSink {
    fn reply(&mut self, bytes: Vec<u8>) -> i32 {
        info!(label = self.label, bytes = bytes.len(), "forwarded reply");
        1
    }
}

/// Builds a single synthetic query/result-set exchange, for demonstrating
/// the transducer without a live backend connection.
fn demo_exchange(row_count: usize) -> (Vec<u8>, Vec<u8>) {
    let request = {
        let mut p = vec![0x03]; // COM_QUERY
        p.extend_from_slice(b"select * from demo");
        p
    };

    let mut reply = vec![1, 0, 0, 1, 1]; // one-column result-set header
    reply.extend([4, 0, 0, 2, b'c', b'o', b'l', b'1']); // field definition
    reply.extend([1, 0, 0, 3, 0xFE]); // field-list EOF
    for i in 0..row_count {
        let value = format!("row{i}");
        let mut row = vec![value.len() as u8];
        row.extend_from_slice(value.as_bytes());
        let mut framed = vec![row.len() as u8, 0, 0, 4 + i as u8];
        framed.extend(row);
        reply.extend(framed);
    }
    reply.extend([5, 0, 0, 4 + row_count as u8, 0xFE, 0x00, 0x00, 0x00, 0x00]); // rows EOF
    (request, reply)
}

async fn run_demo(config: Arc<TransducerConfig>) {
    let mut transducer = RowLimitTransducer::new(
        config,
        LoggingSink { label: "downstream" },
        LoggingSink { label: "upstream" },
    );

    let (request, reply) = demo_exchange(5);
    transducer.on_request(&request);
    transducer.on_reply(&reply);
    info!(
        rows = transducer.current_row_count(),
        dropped = transducer.dropped_count(),
        "demo exchange complete"
    );
    transducer.close();
}

fn run_cache_demo(args: &ProxyServerArgs) {
    let cache = TtlCache::new(
        MemStore::new(),
        args.cache.soft_ttl_ms,
        args.cache.hard_ttl_ms,
    );
    let key = fingerprint(
        Some("demo_db"),
        b"select * from demo",
        &NaiveTokenClassifier,
    );
    cache.put(&key, b"cached result set").unwrap();
    let (result, value) = cache.get(&key, GetFlags::empty()).unwrap();
    info!(?result, bytes = value.map(|v| v.len()), "cache demo lookup");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ProxyServerArgs::parse();
    let log_level_string = args.log_level.clone().unwrap_or_else(|| "DEBUG".to_string());
    let level = Level::from_str(log_level_string.as_str())?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("DEBUG,hyper=INFO,tower=INFO,h2=INFO"))
        .add_directive(level.into())
        .add_directive("hyper=INFO".parse().unwrap())
        .add_directive("h2=INFO".parse().unwrap())
        .add_directive("tower=INFO".parse().unwrap());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_line_number(true)
        .init();

    info!(?args, "demo running with config");

    let config = Arc::new(TransducerConfig {
        max_resultset_rows: args.max_resultset_rows,
        max_resultset_size: args.max_resultset_size,
        debug: args.debug_flags(),
    });

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let (shutdown_tx, _shutdown_rx): (_, Receiver<ShutdownMessage>) =
        watch::channel(ShutdownMessage::Init);

    runtime.block_on(async {
        tokio::select! {
            _ = run_demo(config) => {}
            msg = shutdown_signal() => {
                let _ = shutdown_tx.send(msg);
            }
        }
    });

    run_cache_demo(&args);
    Ok(())
}
