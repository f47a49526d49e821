// Server loop module
// Accepts connections until shutdown is signalled

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::net::TcpListener;

use super::connection::{accept_connection, ConnectionSettings};
use crate::api::Api;
use crate::logger;

/// Per-listener configuration for the accept loop
pub struct ServerLoopConfig {
    pub connection: ConnectionSettings,
    /// Shared with every other listener so shutdown can wait for all of them
    pub active_connections: Arc<AtomicUsize>,
}

/// Accept connections on `listener` until the shutdown flag flips.
///
/// Connections already being served finish their in-flight request in their
/// own tasks.
pub async fn start_server_loop(listener: TcpListener, api: Arc<Api>, config: ServerLoopConfig) {
    let mut shutdown = config.connection.shutdown.clone();

    while !*shutdown.borrow_and_update() {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(
                            stream,
                            peer_addr,
                            &api,
                            &config.connection,
                            &config.active_connections,
                        );
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            Ok(()) = shutdown.changed() => {}
        }
    }

    if let Ok(addr) = listener.local_addr() {
        logger::log_info(&format!("Stopped accepting connections on {addr}"));
    }
}
