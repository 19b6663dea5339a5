//! Credentials record handed in by an external profile loader, and the validated settings a
//! transport is built from.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;
use crate::transaction::IsolationLevel;

/// Value sent as the `X-Presto-Source` header.
pub const DEFAULT_SOURCE: &str = "presto-adapter";

/// How the adapter authenticates against the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
pub enum AuthMethod {
    /// No credentials beyond the user header
    #[default]
    #[serde(alias = "none")]
    NoAuth,
    /// HTTP basic authentication; requires https
    #[serde(alias = "basic_auth", alias = "basic")]
    BasicAuth,
}

/// URL scheme used to reach the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HttpScheme {
    Http,
    Https,
}

impl HttpScheme {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpScheme::Http => "http",
            HttpScheme::Https => "https",
        }
    }
}

/// TLS verification: on, off, or verify against a CA bundle on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SslVerify {
    Flag(bool),
    CaBundle(PathBuf),
}

impl Default for SslVerify {
    fn default() -> Self {
        SslVerify::Flag(true)
    }
}

impl fmt::Display for SslVerify {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SslVerify::Flag(flag) => write!(f, "{flag}"),
            SslVerify::CaBundle(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Connection credentials as found in a profile.
///
/// ```rust
/// use presto_adapter::prelude::*;
///
/// let creds: Credentials = serde_json::from_str(
///     r#"{"host": "coordinator", "port": 8443, "user": "etl",
///         "password": "s3cret", "method": "BasicAuth", "catalog": "hive"}"#,
/// )
/// .unwrap();
/// assert_eq!(creds.database.as_deref(), Some("hive"));
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default, alias = "auth_method")]
    pub method: Option<AuthMethod>,
    #[serde(default)]
    pub http_headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub http_scheme: Option<HttpScheme>,
    #[serde(default)]
    pub ssl_verify: SslVerify,
    /// Catalog; profiles may spell it `catalog`.
    #[serde(default, alias = "catalog")]
    pub database: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub isolation_level: IsolationLevel,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("method", &self.method)
            .field("http_headers", &self.http_headers)
            .field("http_scheme", &self.http_scheme)
            .field("ssl_verify", &self.ssl_verify)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("isolation_level", &self.isolation_level)
            .finish()
    }
}

impl Credentials {
    pub fn new(host: impl Into<String>, port: u16, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            password: None,
            method: None,
            http_headers: None,
            http_scheme: None,
            ssl_verify: SslVerify::default(),
            database: None,
            schema: None,
            isolation_level: IsolationLevel::default(),
        }
    }

    #[must_use]
    pub fn with_basic_auth(mut self, password: impl Into<String>) -> Self {
        self.method = Some(AuthMethod::BasicAuth);
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_http_scheme(mut self, scheme: HttpScheme) -> Self {
        self.http_scheme = Some(scheme);
        self
    }

    #[must_use]
    pub fn with_ssl_verify(mut self, ssl_verify: SslVerify) -> Self {
        self.ssl_verify = ssl_verify;
        self
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.database = Some(catalog.into());
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.http_headers
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = level;
        self
    }

    /// Field identifying the target for logging and connection reuse.
    #[must_use]
    pub fn unique_field(&self) -> &str {
        &self.host
    }

    /// Fields that are safe to print in connection diagnostics.
    #[must_use]
    pub fn connection_keys() -> &'static [&'static str] {
        &["host", "port", "user", "database", "schema", "ssl_verify"]
    }

    /// `(key, value)` pairs for [`Self::connection_keys`]; never includes the password.
    #[must_use]
    pub fn connection_info(&self) -> Vec<(&'static str, String)> {
        vec![
            ("host", self.host.clone()),
            ("port", self.port.to_string()),
            ("user", self.user.clone()),
            ("database", self.database.clone().unwrap_or_default()),
            ("schema", self.schema.clone().unwrap_or_default()),
            ("ssl_verify", self.ssl_verify.to_string()),
        ]
    }

    /// Resolve the auth mode and scheme.
    ///
    /// Basic auth is only allowed over https; with basic auth an unset scheme becomes https,
    /// otherwise it defaults to http. Nothing here touches the network.
    ///
    /// # Errors
    /// Returns `AdapterError::Configuration` for basic auth over plain http or without a
    /// password.
    pub fn settings(&self) -> Result<ConnectionSettings, AdapterError> {
        let (http_scheme, basic_auth) = match self.method.unwrap_or_default() {
            AuthMethod::BasicAuth => {
                if matches!(self.http_scheme, Some(scheme) if scheme != HttpScheme::Https) {
                    return Err(AdapterError::Configuration(
                        "http_scheme must be set to 'https' for 'BasicAuth' method.".to_string(),
                    ));
                }
                let password = self.password.clone().ok_or_else(|| {
                    AdapterError::Configuration(
                        "password is required for 'BasicAuth' method.".to_string(),
                    )
                })?;
                (
                    HttpScheme::Https,
                    Some(BasicAuth {
                        username: self.user.clone(),
                        password,
                    }),
                )
            }
            AuthMethod::NoAuth => (self.http_scheme.unwrap_or(HttpScheme::Http), None),
        };

        Ok(ConnectionSettings {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            http_scheme,
            basic_auth,
            catalog: self.database.clone(),
            schema: self.schema.clone(),
            http_headers: self.http_headers.clone().unwrap_or_default(),
            ssl_verify: self.ssl_verify.clone(),
            source: DEFAULT_SOURCE.to_string(),
        })
    }
}

/// Username/password pair for HTTP basic auth.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Validated transport settings derived from [`Credentials`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub http_scheme: HttpScheme,
    pub basic_auth: Option<BasicAuth>,
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub http_headers: HashMap<String, String>,
    pub ssl_verify: SslVerify,
    pub source: String,
}

impl ConnectionSettings {
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.http_scheme.as_str(), self.host, self.port)
    }
}
