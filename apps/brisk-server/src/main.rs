//! Brisk example server: an in-memory user directory.
//!
//! Shows the whole framework in one binary: declared inputs bound from path,
//! query and body (JSON or XML), a bearer-protected route, request tracing
//! middleware, an optional static directory, and graceful shutdown.
//!
//! # Usage
//!
//! ```text
//! BRISK_LISTEN=127.0.0.1:8080 BRISK_ADMIN_TOKEN=s3cret brisk-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BRISK_LISTEN` | `0.0.0.0:8080` | Bind address |
//! | `BRISK_VALIDATION_STATUS` | `422` | Status for decode and validation failures |
//! | `BRISK_MAX_BODY_BYTES` | `10485760` | Request body limit |
//! | `BRISK_MEDIA_TYPES` | `json,xml` | Accepted body media types |
//! | `BRISK_LANGUAGE` | `en` | Default message language |
//! | `BRISK_ADMIN_TOKEN` | *(unset)* | Bearer token for `DELETE /users/{id}` |
//! | `BRISK_STATIC_DIR` | *(unset)* | Directory served under `/static` |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `LOG_FORMAT` | `text` | `json` for structured log lines |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

mod users;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use brisk_core::ApiConfig;
use brisk_http::{Api, ApiService, TraceRequests, install_panic_hook};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::users::Directory;

/// Server version reported in health check responses.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

/// Build the API: user routes, optional static files, tracing middleware.
fn build_api(config: ApiConfig, static_dir: Option<&str>) -> Result<Api> {
    let mut api = Api::new(config);
    let directory = Arc::new(Directory::default());

    users::register(&mut api, &directory, VERSION).context("failed to register user routes")?;

    if let Some(dir) = static_dir {
        api.static_dir("/static", dir)
            .with_context(|| format!("failed to serve static directory {dir}"))?;
    }

    api.middleware(TraceRequests);
    Ok(api)
}

/// Run the accept loop, serving connections until a shutdown signal is received.
async fn serve(listener: TcpListener, service: ApiService) -> Result<()> {
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

    // Wait for in-flight requests to complete.
    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ApiConfig::from_env();
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    init_tracing(&config.log_level, json_logs)?;
    install_panic_hook();

    info!(
        listen = %config.listen,
        validation_status = config.validation_status,
        max_body_bytes = config.max_body_bytes,
        language = %config.language,
        version = VERSION,
        "starting brisk server",
    );

    let addr: SocketAddr = config
        .listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.listen))?;

    let static_dir = std::env::var("BRISK_STATIC_DIR").ok();
    let service = build_api(config, static_dir.as_deref())?.into_service();

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "listening for connections");

    serve(listener, service).await
}
