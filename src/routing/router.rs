//! Path router
//!
//! Maps normalized paths to resources. The table is filled during startup and
//! only read afterwards.

use std::collections::HashMap;

use super::path::normalize_path;
use super::resource::Resource;
use crate::error::DispatchError;
use crate::logger;

/// Exact-match path → resource table
#[derive(Debug, Default)]
pub struct Router {
    resources: HashMap<String, Resource>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource under its path
    ///
    /// The first resource registered at a path wins; later ones are dropped
    /// with a warning.
    #[must_use]
    pub fn add(mut self, resource: Resource) -> Self {
        if self.resources.contains_key(resource.path()) {
            logger::log_warning(&format!(
                "A resource is already routed at path '{}'.",
                resource.path()
            ));
        } else {
            self.resources.insert(resource.path().to_string(), resource);
        }
        self
    }

    /// Resolve a request path to its resource
    pub fn route(&self, path: &str) -> Result<&Resource, DispatchError> {
        let path = normalize_path(path);
        self.resources
            .get(&path)
            .ok_or(DispatchError::NotFound(path))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Registered paths, sorted
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.resources.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{RequestData, ResponseWriter};
    use http_body_util::BodyExt;
    use hyper::Request;

    #[test]
    fn test_route_registered_and_missing() {
        let router = Router::new()
            .add(Resource::new("/ping").get(|_, _, _| Ok(())))
            .add(Resource::new("/hello"));

        assert_eq!(router.route("/ping").unwrap().path(), "ping");
        assert_eq!(router.route("ping/").unwrap().path(), "ping");
        assert_eq!(router.route("//hello").unwrap().path(), "hello");

        let err = router.route("/missing").unwrap_err();
        assert!(matches!(err, DispatchError::NotFound(ref p) if p == "missing"));
    }

    #[test]
    fn test_no_prefix_matching() {
        let router = Router::new().add(Resource::new("/api"));
        assert!(router.route("/api/users").is_err());
        assert!(router.route("/ap").is_err());
        assert!(router.route("/").is_err());
    }

    #[tokio::test]
    async fn test_duplicate_registration_keeps_first() {
        let router = Router::new()
            .add(Resource::new("/dup").get(|_, _, res| {
                res.end("first")?;
                Ok(())
            }))
            .add(Resource::new("dup/").get(|_, _, res| {
                res.end("second")?;
                Ok(())
            }));
        assert_eq!(router.len(), 1);

        let parts = Request::builder().uri("/dup").body(()).unwrap().into_parts().0;
        let mut res = ResponseWriter::new();
        router
            .route("/dup")
            .unwrap()
            .dispatch("get", &RequestData::default(), &parts, &mut res)
            .unwrap();
        let bytes = res.into_response().into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"first");
    }

    #[test]
    fn test_paths_sorted() {
        let router = Router::new()
            .add(Resource::new("/b"))
            .add(Resource::new("/a"));
        assert_eq!(router.paths(), vec!["a", "b"]);
        assert!(!router.is_empty());
    }
}
