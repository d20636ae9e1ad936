//! Read-only access to the attributes documents of items below a root.
//!
//! A root is either a local directory (optionally given as a `file://` URL) or an `http://` or
//! `https://` URL. This module provides the local [`FilesystemSource`].

use std::path::{MAIN_SEPARATOR, Path};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::attributes::{ATTRIBUTES_FILE, json_type_name};

const FILE_SCHEME: &str = "file://";

/// An error reading an attributes document from a source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The document could not be read.
    #[error("failed to read {location}: {source}")]
    IOError {
        /// The location of the document.
        location: String,
        /// The underlying error.
        source: std::io::Error,
    },
    /// The document is not valid JSON.
    #[error("invalid JSON in {location}: {source}")]
    InvalidJson {
        /// The location of the document.
        location: String,
        /// The underlying error.
        source: serde_json::Error,
    },
    /// The document is not a JSON object.
    #[error("attributes in {location} must be a JSON object, got {kind}")]
    NotAnObject {
        /// The location of the document.
        location: String,
        /// The JSON type of the document.
        kind: &'static str,
    },
    /// A remote request failed.
    #[error("request for {location} failed: {reason}")]
    Remote {
        /// The location of the document.
        location: String,
        /// Why the request failed.
        reason: String,
    },
}

/// Read-only access to attributes documents below a root.
pub trait AttributesSource {
    /// The location of the attributes document of `item`, for diagnostics.
    fn location(&self, item: &str) -> String;

    /// Read the attributes document of `item`.
    ///
    /// # Errors
    /// Returns a [`SourceError`] if the document does not exist, cannot be read, or is not a JSON object.
    fn get_attributes(&self, item: &str) -> Result<Map<String, Value>, SourceError>;
}

/// Parse the bytes of an attributes document read from `location`.
///
/// # Errors
/// Returns a [`SourceError`] if `bytes` is not a JSON object.
pub fn parse_attributes(location: &str, bytes: &[u8]) -> Result<Map<String, Value>, SourceError> {
    match serde_json::from_slice(bytes) {
        Ok(Value::Object(attributes)) => Ok(attributes),
        Ok(other) => Err(SourceError::NotAnObject {
            location: location.to_string(),
            kind: json_type_name(&other),
        }),
        Err(source) => Err(SourceError::InvalidJson {
            location: location.to_string(),
            source,
        }),
    }
}

/// Returns true if `s` is an `http://` or `https://` URL.
#[must_use]
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Strip a leading `file://` from `s`.
#[must_use]
pub fn strip_file_scheme(s: &str) -> &str {
    s.strip_prefix(FILE_SCHEME).unwrap_or(s)
}

/// Append `items` to the URL `base`, separated by single slashes.
///
/// Trailing slashes of `base` and leading slashes of each item are dropped.
#[must_use]
pub fn urljoin(base: &str, items: &[&str]) -> String {
    let mut url = base.trim_end_matches('/').to_string();
    for item in items {
        url.push('/');
        url.push_str(item.trim_start_matches('/'));
    }
    url
}

/// Join a path `item` within the container to `root`.
///
/// URL roots are joined with `/`, local roots with the platform separator.
#[must_use]
pub fn join_root_item(root: &str, item: &str) -> String {
    if is_url(root) {
        format!("{}/{}", root.trim_end_matches('/'), item.trim_matches('/'))
    } else {
        join_path(root, &[item.trim_matches(MAIN_SEPARATOR)])
    }
}

/// Join `items` to the local path `base`.
///
/// An absolute item replaces everything before it.
pub(crate) fn join_path(base: &str, items: &[&str]) -> String {
    let mut path = Path::new(base).to_path_buf();
    for item in items {
        path.push(item);
    }
    path.to_string_lossy().into_owned()
}

/// A source reading attributes documents from the local filesystem.
#[derive(Clone, Debug)]
pub struct FilesystemSource {
    root: String,
}

impl FilesystemSource {
    /// Create a filesystem source for the container at `root`.
    ///
    /// A leading `file://` is stripped.
    #[must_use]
    pub fn new(root: &str) -> Self {
        Self {
            root: strip_file_scheme(root).to_string(),
        }
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }
}

impl AttributesSource for FilesystemSource {
    fn location(&self, item: &str) -> String {
        join_path(&join_root_item(&self.root, item), &[ATTRIBUTES_FILE])
    }

    fn get_attributes(&self, item: &str) -> Result<Map<String, Value>, SourceError> {
        let location = self.location(item);
        log::debug!("Reading attributes from {location}");
        let bytes = std::fs::read(&location).map_err(|source| SourceError::IOError {
            location: location.clone(),
            source,
        })?;
        parse_attributes(&location, &bytes)
    }
}
