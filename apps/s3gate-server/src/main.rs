//! s3gate server: an S3-compatible gateway over the in-memory backend.
//!
//! # Usage
//!
//! ```text
//! GATEWAY_LISTEN=0.0.0.0:8080 GATEWAY_IDENTITIES=alice,bob s3gate-server
//! ```
//!
//! Every tunable is read from the environment; see
//! [`GatewayConfig::from_env`] for the full table. `RUST_LOG` overrides
//! `LOG_LEVEL` for fine-grained tracing filters.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use s3gate_core::identity::CallerIdentity;
use s3gate_core::{Backend, GatewayConfig, MemoryBackend, S3Gateway};
use s3gate_http::dispatch::S3Handler;
use s3gate_http::{GatewayHandler, S3HttpConfig, S3HttpService};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

fn build_http_config<B: Backend>(gateway: &S3Gateway<B>) -> S3HttpConfig {
    S3HttpConfig {
        admission: Some(gateway.shared_admission()),
        ..S3HttpConfig::default()
    }
}

/// Register the configured identities. Failures are logged, not fatal; an
/// unregistered caller is rejected per request instead.
async fn register_identities<B: Backend>(gateway: &S3Gateway<B>) {
    for id in &gateway.config().identities {
        let caller = CallerIdentity::new(id.as_str());
        match gateway.register_identity(&caller).await {
            Ok(()) => info!(identity = %id, "registered identity"),
            Err(e) => warn!(identity = %id, error = %e, "failed to register identity"),
        }
    }
}

/// Accept connections until ctrl-c, then drain in-flight requests.
async fn serve<H: S3Handler>(listener: TcpListener, service: S3HttpService<H>) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

/// Check the health endpoint of a running gateway.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;
    let (mut reader, mut writer) = stream.into_split();

    let request = format!("GET /_health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.contains("200 OK") && response.contains("\"status\":\"running\"") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = GatewayConfig::from_env();

    if std::env::args().any(|a| a == "--health-check") {
        let addr = config.gateway_listen.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    init_tracing(&config.log_level)?;

    info!(
        gateway_listen = %config.gateway_listen,
        max_request_num = config.max_request_num,
        cache_dir = %config.cache_dir.display(),
        identities = config.identities.len(),
        version = VERSION,
        "starting s3gate server",
    );

    let addr: SocketAddr = config
        .gateway_listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.gateway_listen))?;

    let gateway = S3Gateway::new(MemoryBackend::new(), config);
    register_identities(&gateway).await;

    let http_config = build_http_config(&gateway);
    let service = S3HttpService::new(GatewayHandler::new(Arc::new(gateway)), http_config);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "listening for connections");

    serve(listener, service).await
}
