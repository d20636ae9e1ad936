//! A synchronous HTTP attributes source for the [`n5meta`](https://docs.rs/n5meta) crate.
//!
//! ```no_run
//! # use n5meta::AttributesSource;
//! use n5meta_http::{HttpSource, HttpSourceOptions};
//!
//! let mut options = HttpSourceOptions::default();
//! options.basic_auth(Some("user:pass".parse()?));
//! let source = HttpSource::new("https://example.com/data.n5", &options)?;
//! let attributes = source.get_attributes("volumes/raw")?;
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Licence
//! `n5meta_http` is licensed under either of
//! - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//! - the MIT license <http://opensource.org/licenses/MIT>, at your option.

use std::{fmt, str::FromStr, time::Duration};

use n5meta::{
    ATTRIBUTES_FILE,
    source::{
        AttributesSource, FilesystemSource, SourceError, is_url, join_root_item,
        parse_attributes, urljoin,
    },
};
use reqwest::{StatusCode, blocking::Client};
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

/// The default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Credentials could not be parsed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("HTTP basic authentication must be given as 'username:password'")]
pub struct BasicAuthParseError;

/// HTTP basic authentication credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    /// Create new credentials.
    #[must_use]
    pub fn new(username: String, password: String) -> Self {
        Self { username, password }
    }

    /// The username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl FromStr for BasicAuth {
    type Err = BasicAuthParseError;

    /// Parse `username:password`, splitting at the first `:`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (username, password) = s.split_once(':').ok_or(BasicAuthParseError)?;
        Ok(Self::new(username.to_string(), password.to_string()))
    }
}

/// Options for an [`HttpSource`].
#[derive(Debug, Clone)]
pub struct HttpSourceOptions {
    timeout: Option<Duration>,
    insecure: bool,
    proxy: bool,
    basic_auth: Option<BasicAuth>,
}

impl Default for HttpSourceOptions {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
            insecure: false,
            proxy: true,
            basic_auth: None,
        }
    }
}

impl HttpSourceOptions {
    /// Set the request timeout, or [`None`] for no timeout. Defaults to [`DEFAULT_TIMEOUT`].
    pub fn timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// Set whether to skip TLS certificate and hostname verification. Disabled by default.
    ///
    /// Only use this for servers you trust, e.g. with self-signed certificates.
    pub fn insecure(&mut self, insecure: bool) -> &mut Self {
        self.insecure = insecure;
        self
    }

    /// Set whether to use the system proxy configuration. Enabled by default.
    pub fn proxy(&mut self, proxy: bool) -> &mut Self {
        self.proxy = proxy;
        self
    }

    /// Set the credentials sent with every request.
    pub fn basic_auth(&mut self, basic_auth: Option<BasicAuth>) -> &mut Self {
        self.basic_auth = basic_auth;
        self
    }
}

/// An [`HttpSource`] creation error.
#[derive(Debug, Error)]
pub enum HttpSourceCreateError {
    /// The base URL is invalid.
    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),
    /// The base URL is not `http` or `https`.
    #[error("unsupported URL scheme '{0}', expected http or https")]
    UnsupportedScheme(String),
    /// The HTTP client could not be created.
    #[error(transparent)]
    Client(#[from] reqwest::Error),
}

/// An attributes source reading over HTTP.
#[derive(Debug)]
pub struct HttpSource {
    base_url: Url,
    client: Client,
    basic_auth: Option<BasicAuth>,
}

impl HttpSource {
    /// Create a new HTTP source for the container at `base_url`.
    ///
    /// # Errors
    /// Returns a [`HttpSourceCreateError`] if `base_url` is not a valid `http` or `https` URL, or the client cannot be created.
    pub fn new(base_url: &str, options: &HttpSourceOptions) -> Result<Self, HttpSourceCreateError> {
        let base_url = Url::parse(base_url)?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(HttpSourceCreateError::UnsupportedScheme(
                base_url.scheme().to_string(),
            ));
        }

        let mut builder = Client::builder().timeout(options.timeout);
        if options.insecure {
            log::warn!("TLS certificate and hostname verification is disabled for {base_url}");
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        if !options.proxy {
            builder = builder.no_proxy();
        }

        Ok(Self {
            base_url,
            client: builder.build()?,
            basic_auth: options.basic_auth.clone(),
        })
    }

    /// The base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl AttributesSource for HttpSource {
    fn location(&self, item: &str) -> String {
        urljoin(
            &join_root_item(self.base_url.as_str(), item),
            &[ATTRIBUTES_FILE],
        )
    }

    fn get_attributes(&self, item: &str) -> Result<Map<String, Value>, SourceError> {
        let location = self.location(item);
        let remote = |err: reqwest::Error| SourceError::Remote {
            location: location.clone(),
            reason: err.to_string(),
        };
        log::debug!("Requesting {location}");

        let mut request = self.client.get(&location);
        if let Some(basic_auth) = &self.basic_auth {
            request = request.basic_auth(&basic_auth.username, Some(&basic_auth.password));
        }
        let response = request.send().map_err(remote)?;
        let status = response.status();
        if status != StatusCode::OK {
            log::debug!("{location} responded with {status}");
        }
        let bytes = response
            .error_for_status()
            .map_err(remote)?
            .bytes()
            .map_err(remote)?;
        parse_attributes(&location, &bytes)
    }
}

/// Open the container at `root`, over HTTP for `http://` and `https://` roots and from the local
/// filesystem otherwise.
///
/// # Errors
/// Returns a [`HttpSourceCreateError`] if `root` is an invalid URL, or the client cannot be created.
pub fn open_source(
    root: &str,
    options: &HttpSourceOptions,
) -> Result<Box<dyn AttributesSource>, HttpSourceCreateError> {
    if is_url(root) {
        Ok(Box::new(HttpSource::new(root, options)?))
    } else {
        Ok(Box::new(FilesystemSource::new(root)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_parse() {
        let auth: BasicAuth = "user:pa:ss".parse().unwrap();
        assert_eq!(auth.username(), "user");
        assert_eq!(auth, BasicAuth::new("user".to_string(), "pa:ss".to_string()));
        assert_eq!("user".parse::<BasicAuth>(), Err(BasicAuthParseError));
        assert!("user:".parse::<BasicAuth>().is_ok());
    }

    #[test]
    fn basic_auth_debug_hides_password() {
        let auth: BasicAuth = "user:secret".parse().unwrap();
        let debug = format!("{auth:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn http_source_create() {
        let options = HttpSourceOptions::default();
        assert!(HttpSource::new("https://example.com/data.n5", &options).is_ok());
        assert!(matches!(
            HttpSource::new("not a url", &options),
            Err(HttpSourceCreateError::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpSource::new("ftp://example.com/data.n5", &options),
            Err(HttpSourceCreateError::UnsupportedScheme(scheme)) if scheme == "ftp"
        ));
    }

    #[test]
    fn http_source_location() {
        let source =
            HttpSource::new("https://example.com/data.n5/", &HttpSourceOptions::default())
                .unwrap();
        assert_eq!(
            source.location("/volumes/raw/s0"),
            "https://example.com/data.n5/volumes/raw/s0/attributes.json"
        );
    }

    #[test]
    fn open_source_dispatch() {
        let options = HttpSourceOptions::default();
        let source = open_source("http://example.com/data.n5", &options).unwrap();
        assert_eq!(
            source.location("raw"),
            "http://example.com/data.n5/raw/attributes.json"
        );
        let source = open_source("file:///data.n5", &options).unwrap();
        assert!(!is_url(&source.location("raw")));
    }
}
