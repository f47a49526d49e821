//! Routing module
//!
//! Resolves request paths to resources and methods to handlers:
//! - Path normalization into resource keys
//! - Exact-match path router
//! - Per-path resources with method handler tables

mod path;
mod resource;
mod router;

pub use path::normalize_path;
pub use resource::{Handler, HandlerResult, HttpMethod, Resource};
pub use router::Router;
