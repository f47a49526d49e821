// Connection handling module
// Serves a single accepted TCP (or TLS) connection

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_rustls::TlsAcceptor;

use crate::api::{Api, ConnectionInfo};
use crate::logger;

/// Accept a connection and serve it in a spawned local task.
///
/// # Arguments
///
/// * `stream` - The TCP stream to handle
/// * `peer_addr` - The peer's socket address
/// * `api` - Shared dispatcher
/// * `settings` - TLS, timeout and shutdown settings of the listener
/// * `conn_counter` - Active connection counter, decremented when the task ends
pub fn accept_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    api: &Arc<Api>,
    settings: &ConnectionSettings,
    conn_counter: &Arc<AtomicUsize>,
) {
    conn_counter.fetch_add(1, Ordering::SeqCst);

    let api = Arc::clone(api);
    let settings = settings.clone();
    let conn_counter = Arc::clone(conn_counter);

    tokio::task::spawn_local(async move {
        match &settings.tls {
            None => {
                let conn = ConnectionInfo {
                    peer_addr,
                    secure: false,
                };
                serve(stream, api, conn, &settings).await;
            }
            Some(acceptor) => match acceptor.accept(stream).await {
                Ok(tls_stream) => {
                    let conn = ConnectionInfo {
                        peer_addr,
                        secure: true,
                    };
                    serve(tls_stream, api, conn, &settings).await;
                }
                Err(e) => {
                    logger::log_warning(&format!("TLS handshake with {peer_addr} failed: {e}"));
                }
            },
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}

/// What a connection task needs from its listener
#[derive(Clone)]
pub struct ConnectionSettings {
    /// `Some` for the HTTPS listener
    pub tls: Option<TlsAcceptor>,
    /// Upper bound on a connection's lifetime
    pub timeout: Option<Duration>,
    pub shutdown: watch::Receiver<bool>,
}

/// Run HTTP/1.1 over `stream` until the connection ends
///
/// On shutdown the in-flight request is allowed to finish; idle keep-alive
/// connections close immediately.
async fn serve<S>(stream: S, api: Arc<Api>, conn: ConnectionInfo, settings: &ConnectionSettings)
where
    S: AsyncRead + AsyncWrite + Unpin + 'static,
{
    let io = TokioIo::new(stream);

    let mut builder = http1::Builder::new();
    builder.keep_alive(true);

    let connection = builder.serve_connection(
        io,
        service_fn(move |req: Request<Incoming>| {
            let api = Arc::clone(&api);
            async move { Ok::<_, Infallible>(api.serve(req, conn).await) }
        }),
    );

    let mut shutdown = settings.shutdown.clone();
    let driven = async {
        tokio::pin!(connection);
        if *shutdown.borrow_and_update() {
            connection.as_mut().graceful_shutdown();
            return connection.await;
        }
        tokio::select! {
            result = connection.as_mut() => result,
            Ok(()) = shutdown.changed() => {
                connection.as_mut().graceful_shutdown();
                connection.await
            }
        }
    };

    match settings.timeout {
        Some(limit) => match tokio::time::timeout(limit, driven).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => logger::log_connection_error(&err),
            Err(_) => {
                logger::log_warning(&format!(
                    "Connection from {} closed after {} seconds",
                    conn.peer_addr,
                    limit.as_secs()
                ));
            }
        },
        None => {
            if let Err(err) = driven.await {
                logger::log_connection_error(&err);
            }
        }
    }
}

/// Wait until every connection task has finished, or `limit` has passed.
///
/// Returns the number of connections still open.
pub async fn drain_connections(conn_counter: &AtomicUsize, limit: Duration) -> usize {
    let deadline = Instant::now() + limit;
    loop {
        let open = conn_counter.load(Ordering::SeqCst);
        if open == 0 || Instant::now() >= deadline {
            return open;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
