use serde::{Deserialize, Serialize};

fn d_feed_path() -> String {
    "/xmlfeed".to_string()
}

fn d_encoding() -> String {
    "UTF-8".to_string()
}

fn d_source_name() -> String {
    "default-adaptor".to_string()
}

/// The search Appliance this adaptor feeds and answers to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplianceConfig {
    /// Hostname or IP of the Appliance's feed receiver, e.g. `gsa.example.com`.
    pub hostname: String,
    #[serde(default = "d_feed_path")]
    pub feed_path: String,
    #[serde(default = "d_source_name")]
    pub datasource: String,
    #[serde(default = "d_encoding")]
    pub character_encoding: String,
    #[serde(default)]
    pub feed_port: Option<u16>,
    /// Explicit IPs/CIDR blocks allowed to reach the document handler,
    /// beyond whatever `hostname` itself resolves to. Empty means "allow
    /// every source" (the allow-list is opt-in, per `IpAllowList`).
    #[serde(default)]
    pub allowed_source_ips: Vec<String>,
    /// When set, `hostname` is resolved at startup and its resulting
    /// addresses are added to the allow-list alongside `allowed_source_ips`.
    #[serde(default)]
    pub resolve_hostname_for_allowlist: bool,
}

impl ApplianceConfig {
    pub fn feed_url(&self) -> String {
        let port = self.feed_port.map(|p| format!(":{p}")).unwrap_or_default();
        format!("http://{}{}{}", self.hostname, port, self.feed_path)
    }
}
