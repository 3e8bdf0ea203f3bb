//! Top-level configuration tree, loaded from a single TOML file.
//!
//! Each concern gets its own submodule and its own serde defaults, the
//! way `sa_domain::config` lays out `ServerConfig`/`CorsConfig` etc. —
//! `Config::validate()` then walks the whole tree once at startup and
//! collects every problem instead of failing on the first one, so an
//! operator fixing their config file sees all the issues in one pass.

mod adaptor;
mod appliance;
mod saml;
mod server;
mod sessions;

pub use adaptor::AdaptorConfig;
pub use appliance::ApplianceConfig;
pub use saml::SamlConfig;
pub use server::{ServerConfig, TlsConfig};
pub use sessions::SessionsConfig;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub appliance: ApplianceConfig,
    #[serde(default)]
    pub adaptor: AdaptorConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    pub saml: SamlConfig,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(text)?;
        Ok(cfg)
    }

    pub fn load_from_path(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Collects every validation problem rather than stopping at the
    /// first. Returns `Ok(())` iff there are no `Error`-severity issues;
    /// `Warning`-severity issues are returned alongside an `Ok` as
    /// informational only when the caller asks via [`Config::validate_report`].
    pub fn validate(&self) -> std::result::Result<(), Vec<ConfigError>> {
        let issues = self.validate_report();
        if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
            Err(issues)
        } else {
            Ok(())
        }
    }

    /// Like [`Config::validate`] but always returns the full issue list,
    /// including warnings, regardless of outcome.
    pub fn validate_report(&self) -> Vec<ConfigError> {
        let mut issues = Vec::new();

        if self.server.host.trim().is_empty() {
            issues.push(ConfigError::error("server.host", "host must not be empty"));
        }
        if self.server.port == 0 {
            issues.push(ConfigError::error("server.port", "port must be nonzero"));
        }
        if self.server.doc_id_path.is_empty() || !self.server.doc_id_path.starts_with('/') {
            issues.push(ConfigError::error(
                "server.doc_id_path",
                "doc_id_path must start with '/'",
            ));
        }

        if self.appliance.hostname.trim().is_empty() {
            issues.push(ConfigError::error(
                "appliance.hostname",
                "hostname must not be empty",
            ));
        }
        if !self.appliance.feed_path.starts_with('/') {
            issues.push(ConfigError::error(
                "appliance.feed_path",
                "feed_path must start with '/'",
            ));
        }

        if cron_field_count(&self.adaptor.full_listing_schedule) != 5 {
            issues.push(ConfigError::error(
                "adaptor.full_listing_schedule",
                "must be a 5-field cron expression (minute hour dom month dow)",
            ));
        }
        if self.adaptor.feed_max_attempts == 0 {
            issues.push(ConfigError::error(
                "adaptor.feed_max_attempts",
                "must be at least 1",
            ));
        }
        if self.adaptor.feed_initial_backoff_secs == 0 {
            issues.push(ConfigError::warning(
                "adaptor.feed_initial_backoff_secs",
                "zero initial backoff means retries fire immediately back to back",
            ));
        }
        if self.adaptor.feed_backoff_cap_secs < self.adaptor.feed_initial_backoff_secs {
            issues.push(ConfigError::error(
                "adaptor.feed_backoff_cap_secs",
                "must be >= feed_initial_backoff_secs",
            ));
        }

        if self.sessions.ttl_secs == 0 {
            issues.push(ConfigError::error("sessions.ttl_secs", "must be nonzero"));
        }
        if self.sessions.shard_count == 0 {
            issues.push(ConfigError::error(
                "sessions.shard_count",
                "must be at least 1",
            ));
        }

        if !self.saml.idp_sso_url.starts_with("https://") && !self.saml.idp_sso_url.starts_with("http://")
        {
            issues.push(ConfigError::error(
                "saml.idp_sso_url",
                "must be an absolute http(s) URL",
            ));
        }
        if self.saml.entity_id.trim().is_empty() {
            issues.push(ConfigError::error(
                "saml.entity_id",
                "entity_id must not be empty",
            ));
        }
        if self.saml.idp_entity_id.trim().is_empty() {
            issues.push(ConfigError::error(
                "saml.idp_entity_id",
                "idp_entity_id must not be empty",
            ));
        }
        if self.saml.clock_skew_secs < 0 {
            issues.push(ConfigError::error(
                "saml.clock_skew_secs",
                "must not be negative",
            ));
        }
        if self.saml.clock_skew_secs > 300 {
            issues.push(ConfigError::warning(
                "saml.clock_skew_secs",
                "clock skew tolerance above 5 minutes widens the replay window",
            ));
        }

        if !self.server.require_client_cert_paths.is_empty() && self.server.tls.is_none() {
            issues.push(ConfigError::warning(
                "server.require_client_cert_paths",
                "client cert requirement has no effect without server.tls configured",
            ));
        }
        if let Some(tls) = &self.server.tls {
            if tls.cert_path.trim().is_empty() {
                issues.push(ConfigError::error("server.tls.cert_path", "must not be empty"));
            }
            if tls.key_path.trim().is_empty() {
                issues.push(ConfigError::error("server.tls.key_path", "must not be empty"));
            }
            if !self.server.require_client_cert_paths.is_empty() && tls.client_trust_store_path.is_none() {
                issues.push(ConfigError::warning(
                    "server.tls.client_trust_store_path",
                    "require_client_cert_paths is set but no client trust store is configured, so no client certificate can ever validate",
                ));
            }
        }

        issues
    }
}

fn cron_field_count(expr: &str) -> usize {
    expr.split_whitespace().count()
}

/// Synchronous, serialized fan-out for config-reload notifications.
///
/// Rather than a typical observer-pattern listener list firing
/// concurrently, `publish` calls each subscribed closure in
/// registration order and waits for it to return before calling the
/// next — matching the "listeners see events in write order" ordering
/// guarantee.
#[derive(Default)]
pub struct ConfigChangePublisher {
    listeners: parking_lot::RwLock<Vec<Box<dyn Fn(&Config) + Send + Sync>>>,
}

impl ConfigChangePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&Config) + Send + Sync + 'static,
    {
        self.listeners.write().push(Box::new(listener));
    }

    pub fn publish(&self, config: &Config) {
        for listener in self.listeners.read().iter() {
            listener(config);
        }
    }
}

impl fmt::Debug for ConfigChangePublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigChangePublisher")
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}

#[cfg(test)]
mod publisher_tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn publish_calls_every_listener_in_order() {
        let publisher = ConfigChangePublisher::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let o1 = order.clone();
        publisher.subscribe(move |_| o1.lock().push(1));
        let o2 = order.clone();
        publisher.subscribe(move |_| o2.lock().push(2));

        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        publisher.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        publisher.publish(&valid_config());
        publisher.publish(&valid_config());

        assert_eq!(*order.lock(), vec![1, 2, 1, 2]);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    pub fn error(field: &str, message: &str) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn warning(field: &str, message: &str) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            ConfigSeverity::Warning => "warning",
            ConfigSeverity::Error => "error",
        };
        write!(f, "[{label}] {}: {}", self.field, self.message)
    }
}

impl From<Vec<ConfigError>> for Error {
    fn from(issues: Vec<ConfigError>) -> Self {
        let joined = issues
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Error::Config(joined)
    }
}

#[cfg(test)]
fn valid_config() -> Config {
    Config {
        server: ServerConfig::default(),
        appliance: ApplianceConfig {
            hostname: "gsa.example.com".to_string(),
            feed_path: "/xmlfeed".to_string(),
            datasource: "docs".to_string(),
            character_encoding: "UTF-8".to_string(),
            feed_port: None,
            allowed_source_ips: Vec::new(),
            resolve_hostname_for_allowlist: false,
        },
        adaptor: AdaptorConfig::default(),
        sessions: SessionsConfig::default(),
        saml: SamlConfig {
            entity_id: "urn:adaptor:sp".to_string(),
            idp_sso_url: "https://idp.example.com/sso".to_string(),
            idp_entity_id: "urn:idp:example".to_string(),
            idp_cert_path: "idp.pem".to_string(),
            sp_key_path: "sp.key".to_string(),
            sp_cert_path: "sp.pem".to_string(),
            acs_path: "/samlassertionconsumer".to_string(),
            authz_path: "/saml-authz".to_string(),
            sign_authz_responses: false,
            clock_skew_secs: 60,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find_issue<'a>(issues: &'a [ConfigError], field: &str) -> Option<&'a ConfigError> {
        issues.iter().find(|i| i.field == field)
    }

    #[test]
    fn valid_config_has_no_errors() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn empty_appliance_hostname_is_an_error() {
        let mut cfg = valid_config();
        cfg.appliance.hostname = String::new();
        let issues = cfg.validate().unwrap_err();
        assert!(find_issue(&issues, "appliance.hostname").is_some());
    }

    #[test]
    fn malformed_cron_expression_is_an_error() {
        let mut cfg = valid_config();
        cfg.adaptor.full_listing_schedule = "not a cron".to_string();
        let issues = cfg.validate().unwrap_err();
        assert!(find_issue(&issues, "adaptor.full_listing_schedule").is_some());
    }

    #[test]
    fn backoff_cap_below_initial_is_an_error() {
        let mut cfg = valid_config();
        cfg.adaptor.feed_initial_backoff_secs = 60;
        cfg.adaptor.feed_backoff_cap_secs = 30;
        let issues = cfg.validate().unwrap_err();
        assert!(find_issue(&issues, "adaptor.feed_backoff_cap_secs").is_some());
    }

    #[test]
    fn high_clock_skew_is_a_warning_not_an_error() {
        let mut cfg = valid_config();
        cfg.saml.clock_skew_secs = 600;
        assert!(cfg.validate().is_ok());
        let issues = cfg.validate_report();
        let issue = find_issue(&issues, "saml.clock_skew_secs").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn idp_sso_url_without_scheme_is_an_error() {
        let mut cfg = valid_config();
        cfg.saml.idp_sso_url = "idp.example.com/sso".to_string();
        let issues = cfg.validate().unwrap_err();
        assert!(find_issue(&issues, "saml.idp_sso_url").is_some());
    }

    #[test]
    fn empty_idp_entity_id_is_an_error() {
        let mut cfg = valid_config();
        cfg.saml.idp_entity_id = String::new();
        let issues = cfg.validate().unwrap_err();
        assert!(find_issue(&issues, "saml.idp_entity_id").is_some());
    }

    #[test]
    fn tls_with_empty_cert_path_is_an_error() {
        let mut cfg = valid_config();
        cfg.server.tls = Some(crate::config::TlsConfig {
            cert_path: String::new(),
            key_path: "key.pem".to_string(),
            client_trust_store_path: None,
        });
        let issues = cfg.validate().unwrap_err();
        assert!(find_issue(&issues, "server.tls.cert_path").is_some());
    }

    #[test]
    fn require_client_cert_without_trust_store_is_a_warning() {
        let mut cfg = valid_config();
        cfg.server.tls = Some(crate::config::TlsConfig {
            cert_path: "cert.pem".to_string(),
            key_path: "key.pem".to_string(),
            client_trust_store_path: None,
        });
        cfg.server.require_client_cert_paths = vec!["/saml-authz".to_string()];
        assert!(cfg.validate().is_ok());
        let issues = cfg.validate_report();
        let issue = find_issue(&issues, "server.tls.client_trust_store_path").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }
}
