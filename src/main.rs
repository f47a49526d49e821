use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use resource_api::config::{self, Settings};
use resource_api::server::{self, ConnectionSettings, ServerLoopConfig};
use resource_api::{logger, resources, Api, Router};

/// How long shutdown waits for in-flight requests
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::DEFAULT_CONFIG_PATH.to_string());
    let settings = Settings::load(&config_path);

    if let Err(e) = logger::init(&settings) {
        logger::log_error(&format!("Failed to open log files, using stdout/stderr: {e}"));
    }

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = settings.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(settings))
}

async fn async_main(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let api = resources::register(Api::from_settings(Router::new(), &settings));
    logger::log_server_start(&settings, &api.router().paths());
    let api = Arc::new(api);

    let (shutdown_tx, shutdown_rx) = server::shutdown_channel();
    server::start_signal_handler(shutdown_tx);

    // Use LocalSet for spawn_local support
    let local = tokio::task::LocalSet::new();
    local.run_until(run_servers(settings, api, shutdown_rx)).await
}

async fn run_servers(
    settings: Settings,
    api: Arc<Api>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let connection_timeout = settings.performance.connection_timeout();
    let active_connections = Arc::new(AtomicUsize::new(0));

    let http_addr = settings.http_socket_addr()?;
    let http_listener = server::create_listener(http_addr)?;
    logger::log_server_listening("http", &http_addr);

    // HTTPS is optional: any failure to start it leaves HTTP running
    let https_task = if settings.https.start_server {
        match start_https(&settings) {
            Ok((listener, acceptor)) => Some(tokio::task::spawn_local(server::start_server_loop(
                listener,
                Arc::clone(&api),
                ServerLoopConfig {
                    connection: ConnectionSettings {
                        tls: Some(acceptor),
                        timeout: connection_timeout,
                        shutdown: shutdown.clone(),
                    },
                    active_connections: Arc::clone(&active_connections),
                },
            ))),
            Err(e) => {
                logger::log_error(&format!("HTTPS server not started: {e}"));
                None
            }
        }
    } else {
        None
    };

    server::start_server_loop(
        http_listener,
        api,
        ServerLoopConfig {
            connection: ConnectionSettings {
                tls: None,
                timeout: connection_timeout,
                shutdown,
            },
            active_connections: Arc::clone(&active_connections),
        },
    )
    .await;

    if let Some(task) = https_task {
        task.await?;
    }

    let open = server::drain_connections(&active_connections, DRAIN_TIMEOUT).await;
    if open > 0 {
        logger::log_warning(&format!("Shutting down with {open} connection(s) still open"));
    }
    logger::log_info("Server stopped");
    Ok(())
}

fn start_https(
    settings: &Settings,
) -> Result<(tokio::net::TcpListener, tokio_rustls::TlsAcceptor), Box<dyn std::error::Error>> {
    let acceptor = server::load_acceptor(&settings.https.tls.cert, &settings.https.tls.key)?;
    let addr = settings.https_socket_addr()?;
    let listener = server::create_listener(addr)?;
    logger::log_server_listening("https", &addr);
    Ok((listener, acceptor))
}
