//! Single-GET fetch strategies.
//!
//! Two implementations share the [`Fetcher`] contract: [`ProcessFetcher`]
//! drives a browser-impersonating executable and [`NativeFetcher`] issues
//! the request with reqwest and hand-built browser headers. Neither returns
//! an error: every failure is folded into a [`FetchResult`] with status 0.

mod native;
mod process;
pub mod resolver;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;

pub use native::{browser_headers, client_hints, NativeFetcher};
pub use process::{build_args, parse_status_marker, ProcessFetcher, STATUS_MARKER};
pub use resolver::{HostOs, Launch, PathStyle, ResolvedBinary, Resolver};

/// One GET to perform.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,
    pub referer: Option<String>,
    /// Raw `Cookie` header value.
    pub cookie_header: Option<String>,
    pub timeout: Duration,
    /// Attempt index on the current base URL; drives user-agent rotation.
    pub attempt: u32,
}

impl FetchRequest {
    pub fn new(url: Url, timeout: Duration) -> Self {
        Self {
            url,
            referer: None,
            cookie_header: None,
            timeout,
            attempt: 0,
        }
    }

    pub fn host(&self) -> String {
        self.url.host_str().unwrap_or_default().to_string()
    }
}

/// Outcome of one fetch. `status == 0` means the request never produced an
/// HTTP response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchResult {
    pub status: u16,
    pub body: String,
    pub error: Option<String>,
    /// Cookies observed during the request, for the caller's jar.
    pub cookies: Vec<(String, String)>,
}

impl FetchResult {
    pub fn ok(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn transport(error: impl Into<String>) -> Self {
        Self {
            status: 0,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn describe(&self) -> String {
        match (&self.error, self.status) {
            (Some(e), 0) => e.clone(),
            (Some(e), s) => format!("HTTP {}: {}", s, e),
            (None, s) => format!("HTTP {}", s),
        }
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, req: &FetchRequest) -> FetchResult;
}

/// Tries `primary`, falling back to `fallback` for the same request when the
/// primary could not produce any HTTP response.
pub struct FallbackFetcher {
    primary: Box<dyn Fetcher>,
    fallback: Box<dyn Fetcher>,
}

impl FallbackFetcher {
    pub fn new(primary: Box<dyn Fetcher>, fallback: Box<dyn Fetcher>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl Fetcher for FallbackFetcher {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn fetch(&self, req: &FetchRequest) -> FetchResult {
        let result = self.primary.fetch(req).await;
        if result.status != 0 {
            return result;
        }
        warn!(
            url = %req.url,
            strategy = self.primary.name(),
            error = %result.describe(),
            "primary fetch failed, using {}",
            self.fallback.name()
        );
        let mut fallback = self.fallback.fetch(req).await;
        // Cookies the primary wrote to its jar are still worth keeping.
        let mut cookies = result.cookies;
        cookies.append(&mut fallback.cookies);
        fallback.cookies = cookies;
        fallback
    }
}

/// Builds the fetcher stack for `config`.
pub fn build(config: &Config) -> Result<Box<dyn Fetcher>> {
    let native = NativeFetcher::new(config)?;
    if !config.use_impersonate {
        info!("process strategy disabled, using native requests");
        return Ok(Box::new(native));
    }
    let resolver = Resolver::from_config(config);
    match resolver.resolve(&config.impersonate_profile, config.impersonate_binary.as_deref()) {
        Some(bin) => {
            debug!(
                path = %bin.path.display(),
                profile_flag = bin.use_profile_flag,
                "using impersonation binary"
            );
            let process = ProcessFetcher::new(bin, config)?;
            Ok(Box::new(FallbackFetcher::new(Box::new(process), Box::new(native))))
        }
        None => {
            info!("no impersonation binary found, using native requests");
            Ok(Box::new(native))
        }
    }
}
