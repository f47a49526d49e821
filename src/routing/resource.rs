//! Path resources
//!
//! A `Resource` is one normalized path plus the handlers registered for it,
//! keyed by HTTP method. OPTIONS is always available and reports the methods
//! the resource supports.

use hyper::http::request::Parts;
use hyper::StatusCode;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::Arc;

use super::path::normalize_path;
use crate::error::DispatchError;
use crate::http::{RequestData, ResponseWriter};

/// Outcome of a handler call
pub type HandlerResult = anyhow::Result<()>;

/// Application-supplied request handler
///
/// Receives the normalized request data, the raw request head and the
/// response writer it is responsible for filling in.
pub type Handler =
    Arc<dyn Fn(&RequestData, &Parts, &mut ResponseWriter) -> HandlerResult + Send + Sync>;

/// Methods a resource can register handlers for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Head,
    Get,
    Put,
    Post,
    Patch,
    Delete,
    Options,
}

impl HttpMethod {
    /// Lower-case token
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Head => "head",
            Self::Get => "get",
            Self::Put => "put",
            Self::Post => "post",
            Self::Patch => "patch",
            Self::Delete => "delete",
            Self::Options => "options",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "head" => Ok(Self::Head),
            "get" => Ok(Self::Get),
            "put" => Ok(Self::Put),
            "post" => Ok(Self::Post),
            "patch" => Ok(Self::Patch),
            "delete" => Ok(Self::Delete),
            "options" => Ok(Self::Options),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

/// A URI path and its method handlers
pub struct Resource {
    path: String,
    /// Registered handlers in registration order (never contains OPTIONS)
    handlers: Vec<(HttpMethod, Handler)>,
    /// Replacement for the built-in OPTIONS response
    options_handler: Option<Handler>,
}

impl Resource {
    pub fn new(path: &str) -> Self {
        Self {
            path: normalize_path(path),
            handlers: Vec::new(),
            options_handler: None,
        }
    }

    /// Normalized path this resource is available at
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Methods supported by this resource, OPTIONS last
    pub fn options(&self) -> Vec<HttpMethod> {
        self.handlers
            .iter()
            .map(|(method, _)| *method)
            .chain(std::iter::once(HttpMethod::Options))
            .collect()
    }

    /// Register or replace the handler for `method`
    ///
    /// A replaced handler keeps its original position in `options()`.
    #[must_use]
    pub fn set_handler<F>(mut self, method: HttpMethod, handler: F) -> Self
    where
        F: Fn(&RequestData, &Parts, &mut ResponseWriter) -> HandlerResult + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        if method == HttpMethod::Options {
            self.options_handler = Some(handler);
        } else if let Some(slot) = self.handlers.iter_mut().find(|(m, _)| *m == method) {
            slot.1 = handler;
        } else {
            self.handlers.push((method, handler));
        }
        self
    }

    #[must_use]
    pub fn head<F>(self, handler: F) -> Self
    where
        F: Fn(&RequestData, &Parts, &mut ResponseWriter) -> HandlerResult + Send + Sync + 'static,
    {
        self.set_handler(HttpMethod::Head, handler)
    }

    #[must_use]
    pub fn get<F>(self, handler: F) -> Self
    where
        F: Fn(&RequestData, &Parts, &mut ResponseWriter) -> HandlerResult + Send + Sync + 'static,
    {
        self.set_handler(HttpMethod::Get, handler)
    }

    #[must_use]
    pub fn put<F>(self, handler: F) -> Self
    where
        F: Fn(&RequestData, &Parts, &mut ResponseWriter) -> HandlerResult + Send + Sync + 'static,
    {
        self.set_handler(HttpMethod::Put, handler)
    }

    #[must_use]
    pub fn post<F>(self, handler: F) -> Self
    where
        F: Fn(&RequestData, &Parts, &mut ResponseWriter) -> HandlerResult + Send + Sync + 'static,
    {
        self.set_handler(HttpMethod::Post, handler)
    }

    #[must_use]
    pub fn patch<F>(self, handler: F) -> Self
    where
        F: Fn(&RequestData, &Parts, &mut ResponseWriter) -> HandlerResult + Send + Sync + 'static,
    {
        self.set_handler(HttpMethod::Patch, handler)
    }

    #[must_use]
    pub fn delete<F>(self, handler: F) -> Self
    where
        F: Fn(&RequestData, &Parts, &mut ResponseWriter) -> HandlerResult + Send + Sync + 'static,
    {
        self.set_handler(HttpMethod::Delete, handler)
    }

    /// Invoke the handler registered for `method`
    ///
    /// `method` is the raw token from the request. Tokens outside the known
    /// set and methods without a handler fail with `MethodNotAllowed`. Handler
    /// errors and panics come back as `DispatchError::Handler`.
    pub fn dispatch(
        &self,
        method: &str,
        data: &RequestData,
        parts: &Parts,
        res: &mut ResponseWriter,
    ) -> Result<(), DispatchError> {
        let not_allowed = || DispatchError::MethodNotAllowed {
            method: method.to_ascii_uppercase(),
            path: self.path.clone(),
        };
        let method = HttpMethod::from_str(method).map_err(|_| not_allowed())?;

        let handler = match method {
            HttpMethod::Options => match &self.options_handler {
                Some(handler) => handler,
                None => return self.respond_options(res),
            },
            _ => self
                .handlers
                .iter()
                .find(|(m, _)| *m == method)
                .map(|(_, handler)| handler)
                .ok_or_else(not_allowed)?,
        };

        match panic::catch_unwind(AssertUnwindSafe(|| handler(data, parts, res))) {
            Ok(result) => result.map_err(DispatchError::Handler),
            Err(payload) => Err(DispatchError::Handler(anyhow::anyhow!(
                "Handler for {method} '{}' panicked: {}",
                self.path,
                panic_message(payload.as_ref())
            ))),
        }
    }

    /// Built-in OPTIONS response
    fn respond_options(&self, res: &mut ResponseWriter) -> Result<(), DispatchError> {
        let allow = self
            .options()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        res.write_head(StatusCode::OK, &[("Allow", allow.as_str())])
            .and_then(|()| res.end(""))
            .map_err(|e| DispatchError::Handler(e.into()))
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("path", &self.path)
            .field("methods", &self.options())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Request;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn parts() -> Parts {
        Request::builder().uri("/").body(()).unwrap().into_parts().0
    }

    fn counting(
        counter: &Arc<AtomicUsize>,
    ) -> impl Fn(&RequestData, &Parts, &mut ResponseWriter) -> HandlerResult {
        let counter = Arc::clone(counter);
        move |_, _, res| {
            counter.fetch_add(1, Ordering::SeqCst);
            res.end("ok")?;
            Ok(())
        }
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("GET".parse::<HttpMethod>(), Ok(HttpMethod::Get));
        assert_eq!("pAtCh".parse::<HttpMethod>(), Ok(HttpMethod::Patch));
        assert!("TRACE".parse::<HttpMethod>().is_err());
        assert_eq!(HttpMethod::Delete.as_str(), "delete");
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_path_is_normalized() {
        assert_eq!(Resource::new("//hello/").path(), "hello");
    }

    #[test]
    fn test_options_always_present() {
        let resource = Resource::new("/x");
        assert_eq!(resource.options(), vec![HttpMethod::Options]);
    }

    #[test]
    fn test_dispatch_invokes_matching_handler_once() {
        let gets = Arc::new(AtomicUsize::new(0));
        let posts = Arc::new(AtomicUsize::new(0));
        let resource = Resource::new("/hello")
            .get(counting(&gets))
            .post(counting(&posts));

        let mut res = ResponseWriter::new();
        resource
            .dispatch("get", &RequestData::default(), &parts(), &mut res)
            .unwrap();
        assert_eq!(gets.load(Ordering::SeqCst), 1);
        assert_eq!(posts.load(Ordering::SeqCst), 0);

        let mut res = ResponseWriter::new();
        resource
            .dispatch("post", &RequestData::default(), &parts(), &mut res)
            .unwrap();
        assert_eq!(gets.load(Ordering::SeqCst), 1);
        assert_eq!(posts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispatch_unsupported_method() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resource = Resource::new("/hello")
            .get(counting(&calls))
            .post(counting(&calls));

        let mut res = ResponseWriter::new();
        let err = resource
            .dispatch("delete", &RequestData::default(), &parts(), &mut res)
            .unwrap_err();
        assert!(matches!(err, DispatchError::MethodNotAllowed { .. }));
        assert_eq!(
            err.to_string(),
            "HTTP method 'DELETE' is not implemented at 'hello'"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!res.has_written());

        let err = resource
            .dispatch("trace", &RequestData::default(), &parts(), &mut res)
            .unwrap_err();
        assert!(matches!(err, DispatchError::MethodNotAllowed { .. }));
    }

    #[test]
    fn test_builtin_options_response() {
        let resource = Resource::new("/hello")
            .get(|_, _, _| Ok(()))
            .post(|_, _, _| Ok(()));

        let mut res = ResponseWriter::new();
        resource
            .dispatch("options", &RequestData::default(), &parts(), &mut res)
            .unwrap();
        assert!(res.is_ended());
        let response = res.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["allow"], "GET, POST, OPTIONS");
    }

    #[test]
    fn test_replaced_handler_keeps_position() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resource = Resource::new("/x")
            .get(|_, _, _| Ok(()))
            .post(|_, _, _| Ok(()))
            .get(counting(&calls));
        assert_eq!(
            resource.options(),
            vec![HttpMethod::Get, HttpMethod::Post, HttpMethod::Options]
        );

        let mut res = ResponseWriter::new();
        resource
            .dispatch("GET", &RequestData::default(), &parts(), &mut res)
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_error_and_panic() {
        let resource = Resource::new("/boom")
            .get(|_, _, _| Err(anyhow::anyhow!("broken")))
            .post(|_, _, _| panic!("exploded"));

        let mut res = ResponseWriter::new();
        let err = resource
            .dispatch("get", &RequestData::default(), &parts(), &mut res)
            .unwrap_err();
        assert!(matches!(err, DispatchError::Handler(_)));
        assert_eq!(err.to_string(), "broken");

        let mut res = ResponseWriter::new();
        let err = resource
            .dispatch("post", &RequestData::default(), &parts(), &mut res)
            .unwrap_err();
        assert!(err.to_string().contains("exploded"));
    }
}
