use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, REFERER,
    UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};
use tracing::debug;

use super::{FetchRequest, FetchResult, Fetcher};
use crate::config::Config;
use crate::error::Result;

static EDGE_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"Edg/(\d+)").expect("valid regex"));
static CHROME_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Chrome/(\d+)").expect("valid regex"));

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";
const LANGUAGES: &str = "zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7,ja;q=0.6";

/// `sec-ch-ua`, `sec-ch-ua-mobile`, `sec-ch-ua-platform` for a Chromium UA.
///
/// Returns `None` for browsers that do not send client hints.
pub fn client_hints(user_agent: &str) -> Option<(String, String, String)> {
    let (brand, version) = if let Some(c) = EDGE_VERSION.captures(user_agent) {
        ("Microsoft Edge", c[1].to_string())
    } else if let Some(c) = CHROME_VERSION.captures(user_agent) {
        ("Google Chrome", c[1].to_string())
    } else {
        return None;
    };
    let ua = format!(
        "\"Chromium\";v=\"{v}\", \"{brand}\";v=\"{v}\", \"Not-A.Brand\";v=\"99\"",
        v = version,
        brand = brand
    );
    let platform = if user_agent.contains("Windows") {
        "\"Windows\""
    } else if user_agent.contains("Macintosh") || user_agent.contains("Mac OS X") {
        "\"macOS\""
    } else if user_agent.contains("Android") {
        "\"Android\""
    } else {
        "\"Linux\""
    };
    let mobile = if user_agent.contains("Mobile") { "?1" } else { "?0" };
    Some((ua, mobile.to_string(), platform.to_string()))
}

/// Browser-shaped header set, in the order a real navigation sends them.
pub fn browser_headers(user_agent: &str, referer: Option<&str>, cookie: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let mut put = |name: HeaderName, value: &str| {
        if let Ok(v) = HeaderValue::from_str(value) {
            headers.insert(name, v);
        }
    };
    put(USER_AGENT, user_agent);
    put(ACCEPT, ACCEPT_HTML);
    put(ACCEPT_LANGUAGE, LANGUAGES);
    if let Some((ua, mobile, platform)) = client_hints(user_agent) {
        put(HeaderName::from_static("sec-ch-ua"), &ua);
        put(HeaderName::from_static("sec-ch-ua-mobile"), &mobile);
        put(HeaderName::from_static("sec-ch-ua-platform"), &platform);
    }
    put(UPGRADE_INSECURE_REQUESTS, "1");
    put(
        HeaderName::from_static("sec-fetch-site"),
        if referer.is_some() { "same-origin" } else { "none" },
    );
    put(HeaderName::from_static("sec-fetch-mode"), "navigate");
    put(HeaderName::from_static("sec-fetch-user"), "?1");
    put(HeaderName::from_static("sec-fetch-dest"), "document");
    if let Some(r) = referer {
        put(REFERER, r);
    }
    if let Some(c) = cookie {
        put(COOKIE, c);
    }
    headers
}

/// Plain reqwest GET with rotating user agents.
pub struct NativeFetcher {
    client: reqwest::Client,
    user_agents: Vec<String>,
}

impl NativeFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder =
            reqwest::Client::builder().redirect(reqwest::redirect::Policy::limited(10));
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        Ok(Self {
            client: builder.build()?,
            user_agents: config.user_agents(),
        })
    }

    pub fn user_agent_for(&self, attempt: u32) -> &str {
        pick_user_agent(&self.user_agents, attempt)
    }
}

fn pick_user_agent(agents: &[String], attempt: u32) -> &str {
    if agents.is_empty() {
        return crate::config::DEFAULT_USER_AGENTS[0];
    }
    &agents[attempt as usize % agents.len()]
}

#[async_trait]
impl Fetcher for NativeFetcher {
    fn name(&self) -> &str {
        "native"
    }

    async fn fetch(&self, req: &FetchRequest) -> FetchResult {
        let ua = self.user_agent_for(req.attempt);
        let headers = browser_headers(ua, req.referer.as_deref(), req.cookie_header.as_deref());
        debug!(url = %req.url, attempt = req.attempt, "native fetch");

        let response = match self
            .client
            .get(req.url.clone())
            .headers(headers)
            .timeout(req.timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                let kind = if e.is_timeout() { "timed out" } else { "request failed" };
                return FetchResult::transport(format!("{}: {}", kind, e));
            }
        };

        let status = response.status().as_u16();
        let set_cookies: Vec<(String, String)> = response
            .cookies()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();

        match response.text().await {
            Ok(body) => FetchResult {
                status,
                body,
                error: None,
                cookies: set_cookies,
            },
            Err(e) => FetchResult {
                cookies: set_cookies,
                ..FetchResult::transport(format!("reading body failed: {}", e))
            },
        }
    }
}
