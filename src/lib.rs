//! Resource-oriented HTTP API framework
//!
//! Applications register [`Resource`]s (a normalized path plus one handler
//! per HTTP method) on an [`Api`]. The server module drives hyper
//! connections into [`Api::serve`], which routes, drains the body and
//! dispatches, turning every failure into a JSON error response.

pub mod api;
pub mod config;
pub mod error;
pub mod http;
pub mod logger;
pub mod resources;
pub mod routing;
pub mod server;

pub use api::{Api, ConnectionInfo};
pub use error::DispatchError;
pub use http::{RequestData, ResponseWriter};
pub use routing::{HttpMethod, Resource, Router};
