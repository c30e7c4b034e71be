use crate::RemoteError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";

/// How the registry address is turned into a URL scheme.
///
/// `Auto` keeps the historical rule: TLS only when the address names port 443.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportPolicy {
    #[default]
    Auto,
    Secure,
    Insecure,
}

impl TransportPolicy {
    /// Base URL for `address`. Addresses that already carry a scheme are kept.
    pub fn base_url(self, address: &str) -> String {
        let address = address.trim().trim_end_matches('/');
        if address.starts_with("http://") || address.starts_with("https://") {
            return address.to_owned();
        }
        let secure = match self {
            TransportPolicy::Auto => address.ends_with(":443"),
            TransportPolicy::Secure => true,
            TransportPolicy::Insecure => false,
        };
        let scheme = if secure { "https" } else { "http" };
        format!("{scheme}://{address}")
    }
}

impl FromStr for TransportPolicy {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(TransportPolicy::Auto),
            "secure" | "tls" => Ok(TransportPolicy::Secure),
            "insecure" | "plaintext" => Ok(TransportPolicy::Insecure),
            other => Err(RemoteError::Config(format!(
                "unknown transport policy '{other}', expected auto, secure or insecure"
            ))),
        }
    }
}

impl fmt::Display for TransportPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportPolicy::Auto => "auto",
            TransportPolicy::Secure => "secure",
            TransportPolicy::Insecure => "insecure",
        })
    }
}

/// Package-registry endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteConfig {
    pub address: String,
    #[serde(default)]
    pub transport: TransportPolicy,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub auth_token: Option<String>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl RemoteConfig {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.trim().to_owned(),
            transport: TransportPolicy::Auto,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            auth_token: None,
        }
    }

    #[must_use]
    pub fn with_transport(mut self, transport: TransportPolicy) -> Self {
        self.transport = transport;
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_owned());
        self
    }

    pub fn base_url(&self) -> String {
        self.transport.base_url(&self.address)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Load config from `~/.config/protopkg/remote.json`.
    pub fn load_default() -> Result<Self, RemoteError> {
        let path = default_config_path()?;
        Self::load(&path)
    }

    pub fn load(path: &Path) -> Result<Self, RemoteError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| RemoteError::Config(format!("invalid remote config: {e}")))
    }
}

fn default_config_path() -> Result<PathBuf, RemoteError> {
    let home = std::env::var("HOME").map_err(|_| RemoteError::Config("HOME not set".to_owned()))?;
    Ok(PathBuf::from(home).join(".config/protopkg/remote.json"))
}

/// Source-hosting (GitHub) client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubConfig {
    pub api_url: String,
    pub user: Option<String>,
    pub token: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub timeout: Duration,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_GITHUB_API.to_owned(),
            user: None,
            token: None,
            cache_dir: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl GithubConfig {
    /// Read `GITHUB_USER`, `GITHUB_TOKEN` and `GITHUB_CACHE_DIR`.
    pub fn from_env() -> Self {
        let var = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };
        Self {
            user: var("GITHUB_USER"),
            token: var("GITHUB_TOKEN"),
            cache_dir: var("GITHUB_CACHE_DIR").map(PathBuf::from),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_api_url(mut self, url: &str) -> Self {
        self.api_url = url.trim_end_matches('/').to_owned();
        self
    }
}
