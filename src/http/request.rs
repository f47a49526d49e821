//! Request normalization
//!
//! Turns the raw pieces of an incoming request (target, headers, query
//! string, body stream) into a single `RequestData` value for handlers.

use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{COOKIE, HOST, SET_COOKIE};
use hyper::http::request::Parts;
use hyper::HeaderMap;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::error::DispatchError;
use crate::routing::normalize_path;

/// Host used to build the absolute URL when the request has no `Host` header
const FALLBACK_HOST: &str = "localhost";

/// A header value as handed to handlers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HeaderField {
    Single(String),
    Multiple(Vec<String>),
}

impl HeaderField {
    /// First (or only) value
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value),
            Self::Multiple(values) => values.first().map(String::as_str),
        }
    }
}

/// Normalized per-request data consumed by exactly one handler call
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestData {
    /// Header names are lower-cased
    pub headers: HashMap<String, HeaderField>,
    /// Query parameters; the last value wins when a key repeats
    pub search_params: HashMap<String, String>,
    /// `#fragment`, or empty
    pub hash: String,
    pub body: String,
}

impl RequestData {
    pub fn new(parts: &Parts, target: &RequestTarget, body: String) -> Self {
        Self {
            headers: header_fields(&parts.headers),
            search_params: search_params(&target.url),
            hash: fragment(&target.url),
            body,
        }
    }

    /// Look up a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&HeaderField> {
        self.headers.get(&name.to_ascii_lowercase())
    }
}

/// Parsed request target
#[derive(Debug, Clone)]
pub struct RequestTarget {
    /// Absolute URL rebuilt from scheme, `Host` and the raw target
    pub url: Url,
    /// Normalized resource key
    pub path: String,
    /// Lower-cased method token
    pub method: String,
}

impl RequestTarget {
    /// Build the absolute URL for a request and normalize path and method
    ///
    /// `secure` selects the `https` scheme; it comes from the connection, not
    /// from the request.
    pub fn parse(parts: &Parts, secure: bool) -> Result<Self, DispatchError> {
        let scheme = if secure { "https" } else { "http" };
        let host = parts
            .headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .filter(|h| !h.is_empty())
            .unwrap_or(FALLBACK_HOST);
        let raw_target = parts.uri.to_string();

        // Absolute-form targets carry their own scheme and authority. Origin-form
        // targets are appended verbatim so that a leading `//` stays part of the
        // path instead of being read as an authority.
        let absolute = if parts.uri.scheme().is_some() {
            raw_target.clone()
        } else {
            let path_and_query = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
            let separator = if path_and_query.starts_with('/') { "" } else { "/" };
            format!("{scheme}://{host}{separator}{path_and_query}")
        };
        let url =
            Url::parse(&absolute).map_err(|_| DispatchError::BadRequest(raw_target.clone()))?;

        Ok(Self {
            path: normalize_path(url.path()),
            method: parts.method.as_str().to_ascii_lowercase(),
            url,
        })
    }
}

/// Bounds applied while draining a request body
#[derive(Debug, Clone, Copy)]
pub struct BodyLimits {
    /// Maximum body size in bytes (0 = unlimited)
    pub max_body_size: u64,
    /// Deadline for the whole body (zero = none)
    pub read_timeout: Duration,
}

/// Drain the body stream and decode it as UTF-8 text
///
/// Invalid UTF-8 sequences are replaced rather than rejected.
pub async fn read_body<B>(body: B, limits: BodyLimits) -> Result<String, DispatchError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let limit = if limits.max_body_size == 0 {
        usize::MAX
    } else {
        usize::try_from(limits.max_body_size).unwrap_or(usize::MAX)
    };
    let collect = Limited::new(body, limit).collect();

    let collected = if limits.read_timeout.is_zero() {
        collect.await
    } else {
        tokio::time::timeout(limits.read_timeout, collect)
            .await
            .map_err(|_| DispatchError::RequestTimeout {
                timeout: limits.read_timeout,
            })?
    };

    match collected {
        Ok(collected) => Ok(String::from_utf8_lossy(&collected.to_bytes()).into_owned()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(DispatchError::PayloadTooLarge {
                limit: limits.max_body_size,
            })
        }
        Err(e) => Err(DispatchError::Body(e.to_string())),
    }
}

/// Flatten the query string into a map; the last value of a repeated key wins
pub fn search_params(url: &Url) -> HashMap<String, String> {
    url.query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn fragment(url: &Url) -> String {
    match url.fragment() {
        Some(f) if !f.is_empty() => format!("#{f}"),
        _ => String::new(),
    }
}

/// Convert a header map into handler-facing fields
///
/// `set-cookie` always stays a list. Repeated `cookie` headers are joined with
/// `"; "`, other repeated headers with `", "`. Values that are not valid UTF-8 are decoded lossily.
pub fn header_fields(headers: &HeaderMap) -> HashMap<String, HeaderField> {
    let mut fields = HashMap::with_capacity(headers.keys_len());

    for name in headers.keys() {
        let values: Vec<String> = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect();

        let field = if *name == SET_COOKIE {
            HeaderField::Multiple(values)
        } else if *name == COOKIE {
            HeaderField::Single(values.join("; "))
        } else {
            HeaderField::Single(values.join(", "))
        };
        fields.insert(name.as_str().to_string(), field);
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use hyper::body::{Bytes, Frame};
    use hyper::Request;
    use std::convert::Infallible;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Body whose client never sends anything
    struct Stalled;

    impl Body for Stalled {
        type Data = Bytes;
        type Error = Infallible;

        fn poll_frame(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
            Poll::Pending
        }
    }

    fn parts_for(method: &str, uri: &str, host: Option<&str>) -> Parts {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(host) = host {
            builder = builder.header("Host", host);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn limits(max_body_size: u64) -> BodyLimits {
        BodyLimits {
            max_body_size,
            read_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_target_plain() {
        let parts = parts_for("GET", "//hello//world/?a=1", Some("example.com:3000"));
        let target = RequestTarget::parse(&parts, false).unwrap();
        assert_eq!(target.url.scheme(), "http");
        assert_eq!(target.url.host_str(), Some("example.com"));
        assert_eq!(target.path, "hello/world");
        assert_eq!(target.method, "get");
    }

    #[test]
    fn test_target_secure_scheme() {
        let parts = parts_for("POST", "/ping", Some("example.com"));
        let target = RequestTarget::parse(&parts, true).unwrap();
        assert_eq!(target.url.scheme(), "https");
        assert_eq!(target.method, "post");
    }

    #[test]
    fn test_target_without_host() {
        let parts = parts_for("GET", "/ping", None);
        let target = RequestTarget::parse(&parts, false).unwrap();
        assert_eq!(target.url.host_str(), Some(FALLBACK_HOST));
        assert_eq!(target.path, "ping");
    }

    #[test]
    fn test_target_bad_host() {
        let parts = parts_for("GET", "/ping", Some("bad host"));
        assert!(matches!(
            RequestTarget::parse(&parts, false),
            Err(DispatchError::BadRequest(_))
        ));
    }

    #[test]
    fn test_search_params_last_value_wins() {
        let url = Url::parse("http://localhost/x?foo=bar&foo=baz&q=a%20b").unwrap();
        let params = search_params(&url);
        assert_eq!(params.len(), 2);
        assert_eq!(params["foo"], "baz");
        assert_eq!(params["q"], "a b");
    }

    #[test]
    fn test_fragment() {
        let url = Url::parse("http://localhost/x#top").unwrap();
        assert_eq!(fragment(&url), "#top");
        let url = Url::parse("http://localhost/x#").unwrap();
        assert_eq!(fragment(&url), "");
        let url = Url::parse("http://localhost/x").unwrap();
        assert_eq!(fragment(&url), "");
    }

    #[test]
    fn test_header_fields() {
        let request = Request::builder()
            .uri("/")
            .header("X-Custom", "a")
            .header("Accept", "text/html")
            .header("Accept", "application/json")
            .header("Set-Cookie", "a=1")
            .header("Set-Cookie", "b=2")
            .body(())
            .unwrap();
        let fields = header_fields(request.headers());
        assert_eq!(fields["x-custom"], HeaderField::Single("a".to_string()));
        assert_eq!(
            fields["accept"],
            HeaderField::Single("text/html, application/json".to_string())
        );
        assert_eq!(
            fields["set-cookie"],
            HeaderField::Multiple(vec!["a=1".to_string(), "b=2".to_string()])
        );
    }

    #[test]
    fn test_repeated_cookie_headers_use_semicolon() {
        let request = Request::builder()
            .uri("/")
            .header("Cookie", "a=1")
            .header("Cookie", "b=2")
            .body(())
            .unwrap();
        let fields = header_fields(request.headers());
        assert_eq!(fields["cookie"], HeaderField::Single("a=1; b=2".to_string()));
    }

    #[test]
    fn test_request_data() {
        let parts = parts_for("GET", "/hello?name=x", Some("localhost"));
        let target = RequestTarget::parse(&parts, false).unwrap();
        let data = RequestData::new(&parts, &target, "body".to_string());
        assert_eq!(data.search_params["name"], "x");
        assert_eq!(data.hash, "");
        assert_eq!(data.body, "body");
        assert_eq!(data.header("HOST").and_then(HeaderField::first), Some("localhost"));
    }

    #[test]
    fn test_request_data_serializes_camel_case() {
        let data = RequestData::default();
        let json = serde_json::to_value(&data).unwrap();
        assert!(json.get("searchParams").is_some());
        assert!(json.get("hash").is_some());
    }

    #[tokio::test]
    async fn test_read_body() {
        let body = Full::new(Bytes::from("x=1"));
        assert_eq!(read_body(body, limits(1024)).await.unwrap(), "x=1");
    }

    #[tokio::test]
    async fn test_read_body_lossy_utf8() {
        let body = Full::new(Bytes::from_static(&[0x66, 0xff, 0x6f]));
        assert_eq!(read_body(body, limits(0)).await.unwrap(), "f\u{fffd}o");
    }

    #[tokio::test]
    async fn test_read_body_too_large() {
        let body = Full::new(Bytes::from("0123456789"));
        assert!(matches!(
            read_body(body, limits(4)).await,
            Err(DispatchError::PayloadTooLarge { limit: 4 })
        ));
    }

    #[tokio::test]
    async fn test_read_body_deadline() {
        let limits = BodyLimits {
            max_body_size: 1024,
            read_timeout: Duration::from_millis(100),
        };
        match read_body(Stalled, limits).await {
            Err(DispatchError::RequestTimeout { timeout }) => {
                assert_eq!(timeout, Duration::from_millis(100));
            }
            other => panic!("expected a body timeout, got {other:?}"),
        }
    }
}
