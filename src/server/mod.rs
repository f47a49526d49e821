// Server module entry
// Listener setup, TLS loading, connection serving and shutdown signals

pub mod connection;
pub mod listener;
pub mod signal;
pub mod tls;

// `loop` is a keyword, so the module is renamed
#[path = "loop.rs"]
pub mod server_loop;

pub use connection::{drain_connections, ConnectionSettings};
pub use listener::create_listener;
pub use server_loop::{start_server_loop, ServerLoopConfig};
pub use signal::{shutdown_channel, start_signal_handler};
pub use tls::load_acceptor;
