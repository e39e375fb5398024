//! HTTP transport.
//!
//! JSON-RPC requests arrive as HTTP/1.1 POST bodies. The accept loop
//! bounds concurrently served connections with a semaphore sized by
//! `max_rpc_workers` and supports graceful shutdown: on signal it stops
//! accepting, then drains in-flight connections before the completion
//! handle resolves.

use crate::errors::{Result, ServerError};
use crate::jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::router::ServerRouter;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

pub struct RpcServer;

/// Handle to a serving accept loop.
pub struct RunningRpcServer {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RunningRpcServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Requests graceful shutdown and returns the completion handle.
    ///
    /// The handle resolves once the accept loop has stopped and every
    /// in-flight connection has been served; the caller decides whether
    /// to bound the wait.
    pub fn shutdown(self) -> JoinHandle<()> {
        let _ = self.shutdown.send(true);
        self.handle
    }
}

impl RpcServer {
    /// Binds `addr` and spawns the accept loop.
    pub async fn start(
        router: Arc<ServerRouter>,
        addr: SocketAddr,
        max_connections: usize,
    ) -> Result<RunningRpcServer> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Transport(format!("failed to bind {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Transport(format!("failed to get local address: {e}")))?;

        tracing::info!("RPC server listening on {local_addr}");

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let semaphore = Arc::new(Semaphore::new(max_connections.max(1)));

        let handle = tokio::spawn(async move {
            let mut connections = JoinSet::new();
            loop {
                let permit = tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    permit = semaphore.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, _)) => {
                            let io = TokioIo::new(stream);
                            let router = router.clone();
                            connections.spawn(async move {
                                let _permit = permit;
                                let service = service_fn(move |req| {
                                    let router = router.clone();
                                    async move { Self::handle_http(router, req).await }
                                });
                                if let Err(err) =
                                    http1::Builder::new().serve_connection(io, service).await
                                {
                                    tracing::debug!("error serving connection: {err}");
                                }
                            });
                        }
                        Err(err) => {
                            tracing::warn!("failed to accept connection: {err}");
                        }
                    },
                }
            }
            drop(listener);
            while connections.join_next().await.is_some() {}
            tracing::info!("RPC server stopped");
        });

        Ok(RunningRpcServer {
            local_addr,
            shutdown: shutdown_tx,
            handle,
        })
    }

    async fn handle_http(
        router: Arc<ServerRouter>,
        request: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>> {
        if request.method() != hyper::Method::POST {
            return to_http(&JsonRpcResponse::error(
                json!(null),
                JsonRpcError::invalid_request("Only POST requests are supported"),
            ));
        }

        let body = request
            .into_body()
            .collect()
            .await
            .map_err(|e| ServerError::Transport(format!("failed to read request body: {e}")))?
            .to_bytes();

        let rpc_request: JsonRpcRequest = match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!("failed to parse JSON-RPC request: {e}");
                return to_http(&JsonRpcResponse::error(
                    json!(null),
                    JsonRpcError::parse_error(),
                ));
            }
        };

        let response = router.handle_request(rpc_request).await;
        to_http(&response)
    }
}

fn to_http(response: &JsonRpcResponse) -> Result<Response<Full<Bytes>>> {
    let body = serde_json::to_vec(response)
        .map_err(|e| ServerError::Transport(format!("failed to serialize response: {e}")))?;
    Response::builder()
        .status(StatusCode::OK)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
        .map_err(|e| ServerError::Transport(format!("failed to build response: {e}")))
}
