use std::{fmt, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Environment prefix for configuration overrides (`RDFSTORE_KNOWLEDGE_BASE=...`).
pub const ENV_PREFIX: &str = "RDFSTORE_";

/// Stardog HTTP protocol generation spoken by the connector
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum StardogVersion {
    /// Stardog 1.x: reasoning via query parameter and `SD-Connection-String`/`SD-Protocol` headers
    #[serde(rename = "v1", alias = "1")]
    V1,
    /// Stardog 2.x: reasoning via query parameter and a reduced `SD-Connection-String` header
    #[serde(rename = "v2", alias = "2")]
    V2,
    /// Stardog 3.x and later: reasoning is controlled by the database
    #[default]
    #[serde(rename = "v3", alias = "3")]
    V3,
}

impl StardogVersion {
    pub fn supports_sparql_update(self) -> bool {
        !matches!(self, StardogVersion::V1)
    }

    pub fn supports_reasoning(self, mode: ReasoningMode) -> bool {
        match self {
            StardogVersion::V1 => mode != ReasoningMode::SL,
            StardogVersion::V2 => true,
            StardogVersion::V3 => {
                matches!(mode, ReasoningMode::None | ReasoningMode::DatabaseControlled)
            }
        }
    }
}

/// Connection-level reasoning mode
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReasoningMode {
    #[default]
    #[serde(rename = "none", alias = "NONE")]
    None,
    QL,
    EL,
    RL,
    DL,
    RDFS,
    SL,
    #[serde(rename = "database_controlled")]
    DatabaseControlled,
}

impl ReasoningMode {
    /// Token sent in the `reasoning` parameter, `None` when no parameter is sent.
    pub fn parameter(self) -> Option<&'static str> {
        match self {
            ReasoningMode::QL => Some("QL"),
            ReasoningMode::EL => Some("EL"),
            ReasoningMode::RL => Some("RL"),
            ReasoningMode::DL => Some("DL"),
            ReasoningMode::RDFS => Some("RDFS"),
            ReasoningMode::SL => Some("SL"),
            ReasoningMode::None | ReasoningMode::DatabaseControlled => None,
        }
    }
}

impl fmt::Display for ReasoningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReasoningMode::None => "No Reasoning",
            ReasoningMode::QL => "OWL QL Reasoning",
            ReasoningMode::EL => "OWL EL Reasoning",
            ReasoningMode::RL => "OWL RL Reasoning",
            ReasoningMode::DL => "OWL DL Reasoning",
            ReasoningMode::RDFS => "RDFS Reasoning",
            ReasoningMode::SL => "SL Reasoning",
            ReasoningMode::DatabaseControlled => "Database Controlled Reasoning",
        };
        f.write_str(label)
    }
}

/// Timeout configuration for store requests
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Timeout for establishing a connection in milliseconds
    pub connect_ms: u64,

    /// Timeout for a whole request/response exchange in milliseconds
    pub request_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 10_000,
            request_ms: 100_000,
        }
    }
}

impl TimeoutConfig {
    /// Get connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }
}

/// HTTP client settings shared by both connectors
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct TransportConfig {
    pub timeouts: TimeoutConfig,

    /// Optional proxy URL applied to every request
    pub proxy: Option<String>,

    /// Skip TLS certificate validation (test deployments only)
    pub accept_invalid_certs: bool,

    /// Idle connections kept per host
    pub pool_max_idle_per_host: usize,

    /// Maximum concurrent requests against the store.
    /// Values below 1 are clamped to 1.
    pub max_concurrent_operations: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeouts: TimeoutConfig::default(),
            proxy: None,
            accept_invalid_certs: false,
            pool_max_idle_per_host: 10,
            max_concurrent_operations: 16,
        }
    }
}

/// Configuration for the Stardog connector
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct StardogConnectorConfig {
    /// Base URL of the Stardog server (e.g., "http://localhost:5820")
    pub url: String,

    /// Knowledge base (database) name
    pub knowledge_base: String,

    /// Optional username; credentials are only sent when both are set
    pub username: Option<String>,

    /// Optional password
    pub password: Option<String>,

    #[serde(default)]
    pub version: StardogVersion,

    /// Requested reasoning mode. Stardog 3.x only accepts `none` or `database_controlled`.
    #[serde(default)]
    pub reasoning: ReasoningMode,

    #[serde(default)]
    pub transport: TransportConfig,
}

impl Default for StardogConnectorConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5820".to_string(),
            knowledge_base: String::new(),
            username: None,
            password: None,
            version: StardogVersion::default(),
            reasoning: ReasoningMode::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl StardogConnectorConfig {
    pub fn new(url: impl Into<String>, knowledge_base: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            knowledge_base: knowledge_base.into(),
            ..Self::default()
        }
    }

    /// Load from defaults, then `path` (TOML), then `RDFSTORE_*` environment variables.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Reasoning mode the connector actually operates with.
    pub fn effective_reasoning(&self) -> ReasoningMode {
        match self.version {
            StardogVersion::V3 => ReasoningMode::DatabaseControlled,
            _ => self.reasoning,
        }
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        credentials(self.username.as_deref(), self.password.as_deref())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_base_url(&self.url, "url")?;

        if self.knowledge_base.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "knowledge_base must not be empty".to_string(),
            ));
        }
        if let Some(c) = self
            .knowledge_base
            .chars()
            .find(|c| KNOWLEDGE_BASE_RESERVED.contains(c) || c.is_whitespace())
        {
            return Err(ConfigError::InvalidConfig(format!(
                "knowledge_base '{}' must not contain {c:?}",
                self.knowledge_base
            )));
        }
        if !self.version.supports_reasoning(self.reasoning) {
            return Err(ConfigError::InvalidConfig(format!(
                "{} is not supported by Stardog {:?}",
                self.reasoning, self.version
            )));
        }
        validate_transport(&self.transport)
    }
}

/// Configuration for the SPARQL Graph Store protocol connector
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct GraphStoreConfig {
    /// Graph Store service endpoint (e.g., "http://localhost:3030/ds/data")
    pub service_url: String,

    pub username: Option<String>,

    pub password: Option<String>,

    /// Media type used for request bodies
    #[serde(default = "default_graph_store_content_type")]
    pub content_type: String,

    #[serde(default)]
    pub transport: TransportConfig,
}

fn default_graph_store_content_type() -> String {
    "text/turtle".to_string()
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        Self {
            service_url: String::new(),
            username: None,
            password: None,
            content_type: default_graph_store_content_type(),
            transport: TransportConfig::default(),
        }
    }
}

impl GraphStoreConfig {
    pub fn new(service_url: impl Into<String>) -> Self {
        Self {
            service_url: service_url.into(),
            ..Self::default()
        }
    }

    /// Load from defaults, then `path` (TOML), then `RDFSTORE_*` environment variables.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        credentials(self.username.as_deref(), self.password.as_deref())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_base_url(&self.service_url, "service_url")?;
        if self.content_type.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "content_type must not be empty".to_string(),
            ));
        }
        validate_transport(&self.transport)
    }
}

/// Characters that would change the meaning of the `{kb}/...` request paths.
const KNOWLEDGE_BASE_RESERVED: [char; 4] = ['/', '?', '#', '%'];

fn credentials<'a>(
    username: Option<&'a str>,
    password: Option<&'a str>,
) -> Option<(&'a str, &'a str)> {
    match (username, password) {
        (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
        _ => None,
    }
}

fn validate_base_url(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidConfig(format!("{field} must not be empty")));
    }
    let parsed = Url::parse(value)
        .map_err(|e| ConfigError::InvalidConfig(format!("{field} '{value}' is invalid: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidConfig(format!(
            "{field} '{value}' must use http or https"
        )));
    }
    Ok(())
}

fn validate_transport(transport: &TransportConfig) -> Result<(), ConfigError> {
    if transport.timeouts.request_ms == 0 {
        return Err(ConfigError::InvalidConfig(
            "transport.timeouts.request_ms must be greater than 0".to_string(),
        ));
    }
    if let Some(proxy) = &transport.proxy {
        Url::parse(proxy).map_err(|e| {
            ConfigError::InvalidConfig(format!("transport.proxy '{proxy}' is invalid: {e}"))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn v3_rejects_explicit_reasoning() {
        let mut config = StardogConnectorConfig::new("http://localhost:5820", "kb");
        config.reasoning = ReasoningMode::QL;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));

        config.reasoning = ReasoningMode::DatabaseControlled;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn v1_rejects_sl_reasoning() {
        let mut config = StardogConnectorConfig::new("http://localhost:5820", "kb");
        config.version = StardogVersion::V1;
        config.reasoning = ReasoningMode::SL;
        assert!(config.validate().is_err());

        config.version = StardogVersion::V2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn v3_always_operates_database_controlled() {
        let config = StardogConnectorConfig::new("http://localhost:5820", "kb");
        assert_eq!(config.effective_reasoning(), ReasoningMode::DatabaseControlled);
    }

    #[test]
    fn empty_knowledge_base_is_rejected() {
        let config = StardogConnectorConfig::new("http://localhost:5820", " ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn knowledge_base_with_url_delimiters_is_rejected() {
        for name in ["a/b", "kb?x=1", "kb#frag", "kb%2F", "my kb"] {
            let config = StardogConnectorConfig::new("http://localhost:5820", name);
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidConfig(_))),
                "{name} should be rejected"
            );
        }
        let config = StardogConnectorConfig::new("http://localhost:5820", "my-kb_2.db");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn non_http_url_is_rejected() {
        let config = StardogConnectorConfig::new("ftp://localhost", "kb");
        assert!(config.validate().is_err());
    }

    #[test]
    fn credentials_require_both_parts() {
        let mut config = StardogConnectorConfig::new("http://localhost:5820", "kb");
        config.username = Some("admin".to_string());
        assert!(config.credentials().is_none());

        config.password = Some("admin".to_string());
        assert_eq!(config.credentials(), Some(("admin", "admin")));
    }

    #[test]
    fn load_merges_toml_over_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
url = "http://stardog.example:5820"
knowledge_base = "people"
version = "v2"
reasoning = "QL"

[transport]
max_concurrent_operations = 4

[transport.timeouts]
connect_ms = 500
request_ms = 2000
"#
        )
        .unwrap();

        let config = StardogConnectorConfig::load(file.path()).unwrap();
        assert_eq!(config.knowledge_base, "people");
        assert_eq!(config.version, StardogVersion::V2);
        assert_eq!(config.reasoning, ReasoningMode::QL);
        assert_eq!(config.transport.max_concurrent_operations, 4);
        assert_eq!(config.transport.pool_max_idle_per_host, 10);
        assert_eq!(
            config.transport.timeouts.request_timeout(),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn load_rejects_unknown_fields() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
url = "http://localhost:5820"
knowledge_base = "kb"
repository = "oops"
"#
        )
        .unwrap();

        assert!(matches!(
            StardogConnectorConfig::load(file.path()),
            Err(ConfigError::LoadError(_))
        ));
    }

    #[test]
    fn graph_store_defaults_to_turtle() {
        let config = GraphStoreConfig::new("http://localhost:3030/ds/data");
        assert_eq!(config.content_type, "text/turtle");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn reasoning_display_labels() {
        assert_eq!(ReasoningMode::QL.to_string(), "OWL QL Reasoning");
        assert_eq!(ReasoningMode::None.to_string(), "No Reasoning");
    }
}
