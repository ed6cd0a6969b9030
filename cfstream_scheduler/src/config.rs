use cfstream_core::client::cloudflare::{
    DEFAULT_ACCOUNTS_PER_PAGE, DEFAULT_API_BASE_URL, DEFAULT_GRAPHQL_ENDPOINT,
};
use cfstream_core::{AccountFilter, CloudflareClientConfig, ExporterError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_LISTEN: &str = ":8080";
pub const DEFAULT_METRICS_PATH: &str = "/metrics";
pub const HEALTH_PATH: &str = "/health";
pub const DEFAULT_SCRAPE_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// Characters the HTTP router treats as path parameters or wildcards.
const ROUTE_SYNTAX: &[char] = &['*', ':', '{', '}'];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    pub listen: String,
    pub cf_api_token: Option<String>,
    #[serde(deserialize_with = "deserialize_account_list")]
    pub include_accounts: Vec<String>,
    pub metrics_path: String,
    #[serde(with = "humantime_serde")]
    pub scrape_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub api_base_url: String,
    pub graphql_endpoint: String,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            cf_api_token: None,
            include_accounts: Vec::new(),
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
            scrape_interval: DEFAULT_SCRAPE_INTERVAL,
            window: DEFAULT_WINDOW,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            graphql_endpoint: DEFAULT_GRAPHQL_ENDPOINT.to_string(),
        }
    }
}

/// Wrapper used by TOML files, which nest settings under `[exporter]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfigFile {
    pub exporter: ExporterConfig,
}

impl ExporterConfig {
    pub fn validate(&self) -> Result<()> {
        match self.cf_api_token.as_deref() {
            Some(token) if !token.trim().is_empty() => {}
            _ => {
                return Err(ExporterError::InvalidConfig(
                    "Please provide CF_API_TOKEN".to_string(),
                ))
            }
        }

        if self.scrape_interval.is_zero() {
            return Err(ExporterError::InvalidConfig(
                "scrape interval must be > 0".to_string(),
            ));
        }

        if self.window.is_zero() {
            return Err(ExporterError::InvalidConfig(
                "analytics window must be > 0".to_string(),
            ));
        }

        let metrics_path = self.metrics_path();
        if metrics_path == HEALTH_PATH {
            return Err(ExporterError::InvalidConfig(format!(
                "metrics path cannot be {}",
                HEALTH_PATH
            )));
        }
        if metrics_path.contains(ROUTE_SYNTAX) {
            return Err(ExporterError::InvalidConfig(format!(
                "metrics path '{}' must be a literal path",
                metrics_path
            )));
        }

        self.check_listen()
    }

    /// Metrics path with a guaranteed leading slash.
    pub fn metrics_path(&self) -> String {
        normalize_metrics_path(&self.metrics_path)
    }

    /// `listen` as `host:port`. A bare `:port` means every interface.
    pub fn listen_target(&self) -> String {
        let listen = self.listen.trim();
        if listen.starts_with(':') {
            format!("0.0.0.0{}", listen)
        } else {
            listen.to_string()
        }
    }

    fn check_listen(&self) -> Result<()> {
        let target = self.listen_target();
        let well_formed = target
            .rsplit_once(':')
            .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());

        if well_formed {
            Ok(())
        } else {
            Err(self.invalid_listen())
        }
    }

    /// Resolve the listen address, looking the host up without blocking the runtime.
    pub async fn resolve_listen_addr(&self) -> Result<SocketAddr> {
        let target = self.listen_target();
        if let Ok(addr) = target.parse::<SocketAddr>() {
            return Ok(addr);
        }

        tokio::net::lookup_host(target.as_str())
            .await
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| self.invalid_listen())
    }

    fn invalid_listen(&self) -> ExporterError {
        ExporterError::InvalidConfig(format!("Invalid listen address '{}'", self.listen))
    }

    pub fn account_filter(&self) -> AccountFilter {
        AccountFilter::new(self.include_accounts.iter().cloned())
    }

    pub fn client_config(&self) -> CloudflareClientConfig {
        CloudflareClientConfig {
            api_token: self.cf_api_token.clone(),
            api_base_url: self.api_base_url.clone(),
            graphql_endpoint: self.graphql_endpoint.clone(),
            request_timeout: self.request_timeout,
            accounts_per_page: DEFAULT_ACCOUNTS_PER_PAGE,
        }
    }
}

pub fn normalize_metrics_path(path: &str) -> String {
    let path = path.trim();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Values supplied on the command line; `None` keeps the file/default value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub listen: Option<String>,
    pub cf_api_token: Option<String>,
    pub include_accounts: Option<String>,
    pub metrics_path: Option<String>,
    pub scrape_interval: Option<Duration>,
    pub window: Option<Duration>,
    pub request_timeout: Option<Duration>,
    pub api_base_url: Option<String>,
    pub graphql_endpoint: Option<String>,
}

impl ConfigOverrides {
    pub fn apply(self, mut config: ExporterConfig) -> ExporterConfig {
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(token) = self.cf_api_token {
            config.cf_api_token = Some(token);
        }
        if let Some(list) = self.include_accounts {
            config.include_accounts = split_account_list(&list);
        }
        if let Some(path) = self.metrics_path {
            config.metrics_path = path;
        }
        if let Some(interval) = self.scrape_interval {
            config.scrape_interval = interval;
        }
        if let Some(window) = self.window {
            config.window = window;
        }
        if let Some(timeout) = self.request_timeout {
            config.request_timeout = timeout;
        }
        if let Some(url) = self.api_base_url {
            config.api_base_url = url;
        }
        if let Some(endpoint) = self.graphql_endpoint {
            config.graphql_endpoint = endpoint;
        }
        config
    }
}

fn split_account_list(list: &str) -> Vec<String> {
    AccountFilter::parse(list).ids().to_vec()
}

fn deserialize_account_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum AccountList {
        Csv(String),
        List(Vec<String>),
    }

    Ok(match AccountList::deserialize(deserializer)? {
        AccountList::Csv(list) => split_account_list(&list),
        AccountList::List(ids) => AccountFilter::new(ids).ids().to_vec(),
    })
}

pub(crate) mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_token() -> ExporterConfig {
        ExporterConfig {
            cf_api_token: Some("token".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_defaults() {
        let config = config_with_token();
        assert!(config.validate().is_ok());
        assert_eq!(config.metrics_path(), "/metrics");
        assert_eq!(config.resolve_listen_addr().await.unwrap(), "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.scrape_interval, Duration::from_secs(60));
        assert_eq!(config.window, Duration::from_secs(1800));
        assert!(config.account_filter().is_empty());
    }

    #[test]
    fn test_missing_token_is_rejected() {
        let err = ExporterConfig::default().validate().unwrap_err();
        assert!(err.is_fatal());

        let config = ExporterConfig {
            cf_api_token: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_metrics_path_normalization() {
        assert_eq!(normalize_metrics_path("metrics"), "/metrics");
        assert_eq!(normalize_metrics_path("/metrics"), "/metrics");
        assert_eq!(normalize_metrics_path("custom/path"), "/custom/path");
    }

    #[test]
    fn test_metrics_path_cannot_shadow_health() {
        let config = ExporterConfig {
            metrics_path: "health".to_string(),
            ..config_with_token()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_metrics_path_rejects_route_syntax() {
        for path in ["*", "/metrics/*rest", "/:account", "/{account}"] {
            let config = ExporterConfig {
                metrics_path: path.to_string(),
                ..config_with_token()
            };
            let err = config.validate().unwrap_err();
            assert!(matches!(err, ExporterError::InvalidConfig(_)), "accepted {path}");
        }
    }

    #[tokio::test]
    async fn test_listen_addr_forms() {
        let config = ExporterConfig {
            listen: "127.0.0.1:9100".to_string(),
            ..config_with_token()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.resolve_listen_addr().await.unwrap(), "127.0.0.1:9100".parse().unwrap());

        let config = ExporterConfig {
            listen: "[::1]:9100".to_string(),
            ..config_with_token()
        };
        assert!(config.validate().is_ok());

        for listen in ["not an address", "127.0.0.1", "host:port", ":99999"] {
            let config = ExporterConfig {
                listen: listen.to_string(),
                ..config_with_token()
            };
            assert!(config.validate().is_err(), "accepted {listen}");
        }

        let config = ExporterConfig {
            listen: "not an address".to_string(),
            ..config_with_token()
        };
        assert!(config.resolve_listen_addr().await.is_err());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let base = ExporterConfig {
            listen: ":9000".to_string(),
            include_accounts: vec!["X".to_string()],
            ..Default::default()
        };

        let config = ConfigOverrides {
            cf_api_token: Some("flag-token".to_string()),
            include_accounts: Some("A, C".to_string()),
            scrape_interval: Some(Duration::from_secs(15)),
            ..Default::default()
        }
        .apply(base);

        assert_eq!(config.listen, ":9000");
        assert_eq!(config.cf_api_token.as_deref(), Some("flag-token"));
        assert_eq!(config.include_accounts, vec!["A", "C"]);
        assert_eq!(config.scrape_interval, Duration::from_secs(15));
    }

    #[test]
    fn test_client_config() {
        let config = ExporterConfig {
            request_timeout: Duration::from_secs(5),
            ..config_with_token()
        };
        let client = config.client_config();

        assert_eq!(client.api_token.as_deref(), Some("token"));
        assert_eq!(client.request_timeout, Duration::from_secs(5));
        assert_eq!(client.graphql_endpoint, DEFAULT_GRAPHQL_ENDPOINT);
    }
}
