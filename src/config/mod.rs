//! Configuration and the process environment record.
//!
//! [`Config`] is the serializable knob surface; [`NuGetEnv`] is the runtime
//! environment built from it, owning everything that used to be process-wide
//! mutable state: the cache root, the protocol memo, and the per-host HTTP
//! clients. Test setups construct a `NuGetEnv` against a temp directory and
//! a mock proxy provider.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::errors::FeedError;
use crate::domain::{PackageName, SemVer};
use crate::infrastructure::feeds::selector::ProtocolMemo;

/// User agent presented on every feed and download request.
pub const USER_AGENT: &str = "Paket";

/// Cache-related settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Overrides the default `{LocalAppData}/NuGet/Cache` root.
    pub root: Option<PathBuf>,
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Timeout for feed queries (seconds).
    pub request_timeout_seconds: u64,
    /// Wall-clock budget for the whole license side-download (seconds).
    pub license_budget_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 30,
            license_budget_seconds: 5,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub http: HttpConfig,
}

impl Config {
    /// Default configuration with environment overrides applied
    /// (`NUFETCH_CACHE_ROOT` replaces the cache root).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(root) = std::env::var("NUFETCH_CACHE_ROOT") {
            if !root.is_empty() {
                config.cache.root = Some(PathBuf::from(root));
            }
        }
        config
    }
}

/// Supplies per-URL proxy configuration. Discovery of proxies is outside the
/// core; callers inject whatever policy applies.
pub trait ProxyProvider: Send + Sync {
    fn proxy_for(&self, url: &str) -> Option<reqwest::Proxy>;
}

/// The default provider: direct connections everywhere.
pub struct NoProxy;

impl ProxyProvider for NoProxy {
    fn proxy_for(&self, _url: &str) -> Option<reqwest::Proxy> {
        None
    }
}

/// Computes the per-package install directory.
pub trait InstallLayout: Send + Sync {
    fn target_folder(
        &self,
        root: &Path,
        group: Option<&str>,
        name: &PackageName,
        version: &SemVer,
        include_version_in_path: bool,
    ) -> PathBuf;
}

/// The conventional layout: `{root}/packages[/{group}]/{Name}[.{version}]`.
pub struct DefaultLayout;

impl InstallLayout for DefaultLayout {
    fn target_folder(
        &self,
        root: &Path,
        group: Option<&str>,
        name: &PackageName,
        version: &SemVer,
        include_version_in_path: bool,
    ) -> PathBuf {
        let mut folder = root.join("packages");
        if let Some(group) = group {
            folder = folder.join(group);
        }
        if include_version_in_path {
            folder.join(format!("{}.{}", name.as_str(), version.normalize()))
        } else {
            folder.join(name.as_str())
        }
    }
}

/// Runtime environment for the acquisition core.
pub struct NuGetEnv {
    cache_root: PathBuf,
    memo: ProtocolMemo,
    proxy: Arc<dyn ProxyProvider>,
    layout: Arc<dyn InstallLayout>,
    clients: Mutex<HashMap<String, reqwest::Client>>,
    request_timeout: Duration,
    license_budget: Duration,
}

impl NuGetEnv {
    pub fn new(config: Config) -> std::io::Result<Arc<Self>> {
        Self::with_providers(config, Arc::new(NoProxy), Arc::new(DefaultLayout))
    }

    pub fn with_providers(
        config: Config,
        proxy: Arc<dyn ProxyProvider>,
        layout: Arc<dyn InstallLayout>,
    ) -> std::io::Result<Arc<Self>> {
        let cache_root = match config.cache.root {
            Some(root) => root,
            None => default_cache_root(),
        };
        std::fs::create_dir_all(&cache_root)?;
        Ok(Arc::new(Self {
            cache_root,
            memo: ProtocolMemo::new(),
            proxy,
            layout,
            clients: Mutex::new(HashMap::new()),
            request_timeout: Duration::from_secs(config.http.request_timeout_seconds),
            license_budget: Duration::from_secs(config.http.license_budget_seconds),
        }))
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    pub fn memo(&self) -> &ProtocolMemo {
        &self.memo
    }

    pub fn layout(&self) -> &dyn InstallLayout {
        self.layout.as_ref()
    }

    pub fn license_budget(&self) -> Duration {
        self.license_budget
    }

    /// HTTP client for the given URL, built lazily per host so the injected
    /// proxy provider can differ between feeds.
    pub fn http(&self, url: &str) -> Result<reqwest::Client, FeedError> {
        let host = host_of(url).to_string();
        let mut clients = self.clients.lock().expect("http client map poisoned");
        if let Some(client) = clients.get(&host) {
            return Ok(client.clone());
        }
        let mut builder = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .user_agent(USER_AGENT);
        if let Some(proxy) = self.proxy.proxy_for(url) {
            builder = builder.proxy(proxy);
        }
        let client = builder.build().map_err(|source| FeedError::Network {
            url: url.to_string(),
            source,
        })?;
        clients.insert(host, client.clone());
        Ok(client)
    }
}

fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let end = rest.find(['/', '?']).unwrap_or(rest.len());
    &rest[..end]
}

fn default_cache_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("NuGet")
        .join("Cache")
}
