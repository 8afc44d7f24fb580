//! Runtime configuration.
//!
//! Values come from built-in defaults, an optional JSON file, and finally the
//! `AV_*` environment variables, in that order of precedence (later wins).

use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://javdb.com";
pub const DEFAULT_PROFILE: &str = "chrome124";
pub const DEFAULT_LOCALE: &str = "zh";
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;

/// Browser user agents rotated by the native strategy, one per attempt.
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Primary catalog base URL.
    pub base_url: String,
    /// Alternate base URLs tried after the primary, in order.
    pub mirrors: Vec<String>,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// User agent overrides; empty means [`DEFAULT_USER_AGENTS`].
    pub user_agents: Vec<String>,
    /// Impersonation profile requested from the fetch executable.
    pub impersonate_profile: String,
    /// Explicit path to the impersonation executable.
    pub impersonate_binary: Option<PathBuf>,
    /// Trust-anchor bundle passed to the executable.
    pub ca_bundle: Option<PathBuf>,
    /// Enables the process-based strategy.
    pub use_impersonate: bool,
    /// Locale sent as cookie and query parameter.
    pub locale: String,
    pub proxy: Option<String>,
    /// Raw `a=b; c=d` cookie string merged into every host seed.
    pub extra_cookie: Option<String>,
    /// Directory holding per-host jar files. A temp dir is used when unset.
    pub cookie_dir: Option<PathBuf>,
    /// Directories probed for vendored executables.
    pub vendor_dirs: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            mirrors: Vec::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agents: Vec::new(),
            impersonate_profile: DEFAULT_PROFILE.to_string(),
            impersonate_binary: None,
            ca_bundle: None,
            use_impersonate: true,
            locale: DEFAULT_LOCALE.to_string(),
            proxy: None,
            extra_cookie: None,
            cookie_dir: None,
            vendor_dirs: default_vendor_dirs(),
        }
    }
}

fn default_vendor_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir.join("bin"));
        dirs.push(exe_dir);
    }
    dirs.push(PathBuf::from("bin"));
    dirs
}

impl Config {
    /// Loads the optional JSON file, then applies the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// [`Config::load`] with the environment read through `lookup`.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)?;
                serde_json::from_str(&raw)?
            }
            None => Config::default(),
        };
        Ok(base.with_overrides(lookup))
    }

    /// Applies `AV_*` overrides read through `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("AV_JAVDB_BASE") {
            self.base_url = v;
        }
        if let Some(v) = get("AV_JAVDB_MIRRORS") {
            self.mirrors = split_list(&v, ',');
        }
        if let Some(v) = get("AV_TIMEOUT_MS") {
            match v.parse::<u64>() {
                Ok(ms) if ms > 0 => self.timeout_ms = ms,
                _ => warn!(value = %v, "ignoring invalid AV_TIMEOUT_MS"),
            }
        }
        if let Some(v) = get("AV_USER_AGENTS") {
            self.user_agents = split_list(&v, '|');
        }
        if let Some(v) = get("AV_IMPERSONATE") {
            self.impersonate_profile = v;
        }
        if let Some(v) = get("AV_CURL_IMPERSONATE") {
            self.impersonate_binary = Some(PathBuf::from(v));
        }
        if let Some(v) = get("AV_CA_BUNDLE") {
            self.ca_bundle = Some(PathBuf::from(v));
        }
        if let Some(v) = get("AV_USE_IMPERSONATE") {
            self.use_impersonate =
                !matches!(v.to_lowercase().as_str(), "0" | "false" | "no" | "off");
        }
        if let Some(v) = get("AV_LOCALE") {
            self.locale = v;
        }
        if let Some(v) = get("AV_HTTP_PROXY") {
            self.proxy = Some(v);
        }
        if let Some(v) = get("AV_JAVDB_COOKIE") {
            self.extra_cookie = Some(v);
        }
        if let Some(v) = get("AV_COOKIE_DIR") {
            self.cookie_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("AV_VENDOR_DIR") {
            self.vendor_dirs.insert(0, PathBuf::from(v));
        }
        self
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }

    /// Primary followed by mirrors, parsed and de-duplicated.
    ///
    /// Unparseable entries are skipped; an empty result is an error.
    pub fn base_urls(&self) -> Result<Vec<Url>> {
        let mut out: Vec<Url> = Vec::new();
        for raw in std::iter::once(&self.base_url).chain(self.mirrors.iter()) {
            let trimmed = raw.trim().trim_end_matches('/');
            if trimmed.is_empty() {
                continue;
            }
            match Url::parse(trimmed) {
                Ok(url) => {
                    if !out.iter().any(|u| u.as_str() == url.as_str()) {
                        out.push(url);
                    }
                }
                Err(e) => warn!(url = trimmed, error = %e, "skipping invalid base url"),
            }
        }
        if out.is_empty() {
            return Err(Error::Config("no valid base url configured".to_string()));
        }
        Ok(out)
    }

    pub fn user_agents(&self) -> Vec<String> {
        if self.user_agents.is_empty() {
            DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect()
        } else {
            self.user_agents.clone()
        }
    }
}

fn split_list(raw: &str, sep: char) -> Vec<String> {
    raw.split(sep)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
