//! HTTP protocol layer module
//!
//! Request normalization for handlers and the response writer they fill in.

pub mod request;
pub mod response;

// Re-export commonly used types
pub use request::{read_body, BodyLimits, HeaderField, RequestData, RequestTarget};
pub use response::{build_error_response, ResponseError, ResponseWriter};
