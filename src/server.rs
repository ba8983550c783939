//! HTTP server and graceful shutdown.
//!
//! # Stopping
//!
//! The server stops for one of two reasons:
//!
//! 1. **SIGTERM / Ctrl-C.** A normal stop: [`Server::serve`] returns `Ok`.
//! 2. **A [`ShutdownError`] escaped a handler chain.** The request that raised
//!    it is answered `500` and [`Server::serve`] returns
//!    [`ServerError::Shutdown`] so `main` can exit non-zero.
//!
//! Either way the listener stops accepting, every open connection is told to
//! finish its in-flight request and close, and the server waits up to the
//! shutdown timeout for that. Connections still open after the timeout are
//! aborted.
//!
//! Under Kubernetes, keep `terminationGracePeriodSeconds` above the shutdown
//! timeout so the drain is not cut short by SIGKILL.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt as _, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::{Error, RequestError, ServerError, ShutdownError};
use crate::response::Response;
use crate::router::Router;

/// How long in-flight connections get to finish once shutdown starts.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

enum Listen {
    Addr(SocketAddr),
    Listener(TcpListener),
}

/// The HTTP server. Speaks HTTP/1.1 and HTTP/2, whichever the client picks.
///
/// ```rust,no_run
/// use garagesale::{Router, Server};
///
/// # async fn run(app: Router) -> Result<(), garagesale::ServerError> {
/// Server::bind(([0, 0, 0, 0], 3000).into()).serve(app).await
/// # }
/// ```
pub struct Server {
    listen: Listen,
    shutdown_timeout: Duration,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    pub fn bind(addr: SocketAddr) -> Self {
        Self { listen: Listen::Addr(addr), shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT }
    }

    /// Serves on an already bound listener.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self { listen: Listen::Listener(listener), shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT }
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Serves `router` until SIGTERM / Ctrl-C or a [`ShutdownError`].
    pub async fn serve(self, router: Router) -> Result<(), ServerError> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Serves `router` until `signal` resolves or a [`ShutdownError`].
    pub async fn serve_with_shutdown(
        self,
        router: Router,
        signal: impl Future<Output = ()> + Send,
    ) -> Result<(), ServerError> {
        let listener = match self.listen {
            Listen::Addr(addr) => TcpListener::bind(addr).await?,
            Listen::Listener(listener) => listener,
        };
        let local = listener.local_addr()?;
        info!(addr = %local, "listening");

        let router = Arc::new(router);
        let (fatal_tx, mut fatal_rx) = mpsc::channel::<ShutdownError>(1);
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();

        tokio::pin!(signal);

        let fatal = loop {
            tokio::select! {
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break None;
                }

                Some(err) = fatal_rx.recv() => {
                    error!(error = %err, in_flight = tasks.len(), "shutting down, draining connections");
                    break Some(err);
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };
                    tasks.spawn(connection(
                        TokioIo::new(stream),
                        remote_addr,
                        Arc::clone(&router),
                        fatal_tx.clone(),
                        stop_rx.clone(),
                    ));
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        };

        drop(listener);
        let _ = stop_tx.send(true);

        let drained = tokio::time::timeout(self.shutdown_timeout, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = tasks.len(),
                timeout = ?self.shutdown_timeout,
                "graceful shutdown timed out, aborting connections"
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }

        info!("stopped");
        match fatal {
            Some(err) => Err(ServerError::Shutdown(err)),
            None => Ok(()),
        }
    }
}

// ── Connections ───────────────────────────────────────────────────────────────

/// Serves one connection until the client closes it or shutdown starts.
async fn connection(
    io: TokioIo<tokio::net::TcpStream>,
    remote_addr: SocketAddr,
    router: Arc<Router>,
    fatal: mpsc::Sender<ShutdownError>,
    mut stop: watch::Receiver<bool>,
) {
    let svc = service_fn(move |req| {
        let router = Arc::clone(&router);
        let fatal = fatal.clone();
        async move { Ok::<_, Infallible>(handle(&router, req, remote_addr, &fatal).await) }
    });

    let builder = ConnBuilder::new(TokioExecutor::new());
    let conn = builder.serve_connection(io, svc);
    tokio::pin!(conn);

    let res = tokio::select! {
        res = conn.as_mut() => res,
        // The borrow `wait_for` returns must not live across `conn.await`.
        () = async { let _ = stop.wait_for(|stop| *stop).await; } => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };
    if let Err(e) = res {
        debug!(peer = %remote_addr, "connection error: {e}");
    }
}

/// Collects the body, dispatches, and reports a shutdown error to the accept
/// loop.
async fn handle(
    router: &Router,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
    fatal: &mpsc::Sender<ShutdownError>,
) -> http::Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(peer = %remote_addr, "reading request body: {e}");
            let err: Error = RequestError::bad_request("unreadable request body").into();
            return Response::from_error(&err).into_inner();
        }
    };

    match router.dispatch(http::Request::from_parts(parts, body), remote_addr).await {
        Ok(res) => res.into_inner(),
        Err(shutdown) => {
            let res = Response::from_error(&Error::Shutdown(shutdown.clone()));
            // Capacity one: the first shutdown error wins, later ones are
            // already covered.
            let _ = fatal.try_send(shutdown);
            res.into_inner()
        }
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT the process receives. On Windows
/// only Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("installing Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("installing SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = sigterm => {}
    }
}
