// Dispatcher module
// Per-request entry point: route, drain body, dispatch, classify failures

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::http::request::Parts;
use hyper::{Request, Response};
use std::net::SocketAddr;
use std::time::Instant;

use crate::config::Settings;
use crate::error::DispatchError;
use crate::http::{
    build_error_response, read_body, BodyLimits, RequestData, RequestTarget, ResponseWriter,
};
use crate::logger::{self, AccessLogEntry};
use crate::routing::{Resource, Router};

/// Facts about the connection a request arrived on
#[derive(Debug, Clone, Copy)]
pub struct ConnectionInfo {
    pub peer_addr: SocketAddr,
    /// Whether the transport is TLS
    pub secure: bool,
}

/// Request dispatcher
///
/// Owns the router. Resources are added while the `Api` is still owned by
/// the startup code; once it is shared behind an `Arc` the table is read-only.
pub struct Api {
    router: Router,
    limits: BodyLimits,
    /// Access log format, `None` when access logging is off
    access_log: Option<String>,
}

impl Api {
    pub fn new(router: Router) -> Self {
        let defaults = Settings::default();
        Self {
            router,
            limits: defaults.limits.body_limits(),
            access_log: Some(defaults.logging.access_log_format),
        }
    }

    pub fn from_settings(router: Router, settings: &Settings) -> Self {
        Self {
            router,
            limits: settings.limits.body_limits(),
            access_log: settings
                .logging
                .access_log
                .then(|| settings.logging.access_log_format.clone()),
        }
    }

    /// Add a resource to the routing table
    #[must_use]
    pub fn add(mut self, resource: Resource) -> Self {
        self.router = self.router.add(resource);
        self
    }

    #[must_use]
    pub const fn with_limits(mut self, limits: BodyLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn with_access_log(mut self, format: Option<String>) -> Self {
        self.access_log = format;
        self
    }

    pub const fn router(&self) -> &Router {
        &self.router
    }

    /// Serve one request
    ///
    /// Never fails: every error is logged and turned into a JSON error
    /// response here.
    pub async fn serve<B>(&self, req: Request<B>, conn: ConnectionInfo) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let started = Instant::now();
        let (parts, body) = req.into_parts();

        let response = match self.handle(&parts, body, conn.secure).await {
            Ok(response) => response,
            Err(err) => {
                logger::log_error(&err.to_string());
                build_error_response(err.status())
            }
        };

        if let Some(format) = &self.access_log {
            let mut entry = AccessLogEntry::from_parts(conn.peer_addr.to_string(), &parts);
            entry.status = response.status().as_u16();
            entry.body_bytes = response
                .body()
                .size_hint()
                .exact()
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(0);
            entry.request_time_us =
                u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
            logger::log_access(&entry, format);
        }

        response
    }

    async fn handle<B>(
        &self,
        parts: &Parts,
        body: B,
        secure: bool,
    ) -> Result<Response<Full<Bytes>>, DispatchError>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let target = RequestTarget::parse(parts, secure)?;
        let resource = self.router.route(&target.path)?;

        let body = read_body(body, self.limits).await?;
        let data = RequestData::new(parts, &target, body);

        let mut res = ResponseWriter::new();
        if let Err(err) = resource.dispatch(&target.method, &data, parts, &mut res) {
            if res.has_written() {
                logger::log_warning(&format!(
                    "Discarding partial response of failed {} handler at '{}'",
                    parts.method,
                    resource.path()
                ));
            }
            return Err(err);
        }

        if !res.is_ended() {
            logger::log_warning(&format!(
                "{} handler at '{}' returned without ending the response",
                parts.method,
                resource.path()
            ));
        }
        Ok(res.into_response())
    }
}
