//! Path normalization
//!
//! Resource keys are compared after normalization: leading and trailing
//! slashes are stripped and runs of slashes collapse to one.

/// Normalize a URI path into a resource key
///
/// `"/a//b/"`, `"a/b"` and `"/a/b"` all become `"a/b"`. The root path and the
/// empty string both normalize to `""`.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
