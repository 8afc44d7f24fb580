//! Catalog client: search, detail and health operations over the retry loop.

use reqwest::Url;
use tracing::{debug, info, warn};
use urlencoding::encode;

use crate::config::Config;
use crate::cookies::CookieJar;
use crate::error::{Error, Result};
use crate::fetch::{self, FetchRequest, Fetcher};
use crate::parse;
use crate::rank;
use crate::retry::{CancelToken, Outcome, RetryPolicy, RetryState, Step};
use crate::types::{CandidateRecord, DetailRecord, Health};

/// One URL the retry loop may hit, with the referer to send.
#[derive(Debug, Clone)]
struct Target {
    url: Url,
    referer: Option<String>,
}

/// A successful fetch.
#[derive(Debug, Clone)]
struct Fetched {
    url: Url,
    url_index: usize,
    status: u16,
    body: String,
}

/// Appends `locale=<locale>` unless the URL already carries one.
pub fn with_locale(mut url: Url, locale: &str) -> Url {
    if locale.is_empty() || url.query_pairs().any(|(k, _)| k == "locale") {
        return url;
    }
    url.query_pairs_mut().append_pair("locale", locale);
    url
}

/// `scheme://host[:port]/` of `url`.
fn root_of(url: &Url) -> String {
    format!("{}/", url.origin().ascii_serialization())
}

/// Retrieval pipeline against the configured base URLs.
///
/// Every network operation takes `&mut self`: the cookie jar is updated after
/// each attempt, and one scraper serves one operation at a time.
pub struct Scraper {
    config: Config,
    bases: Vec<Url>,
    fetcher: Box<dyn Fetcher>,
    policy: RetryPolicy,
    cookies: CookieJar,
    cancel: CancelToken,
}

impl Scraper {
    /// Builds the fetcher stack from `config`.
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = fetch::build(&config)?;
        Self::with_fetcher(config, fetcher)
    }

    pub fn with_fetcher(config: Config, fetcher: Box<dyn Fetcher>) -> Result<Self> {
        let bases = config.base_urls()?;
        Ok(Self {
            config,
            bases,
            fetcher,
            policy: RetryPolicy::default(),
            cookies: CookieJar::new(),
            cancel: CancelToken::new(),
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn search_url(&self, base: &Url, identifier: &str) -> Result<Url> {
        let raw = format!(
            "{}/search?q={}&f=all",
            base.as_str().trim_end_matches('/'),
            encode(identifier)
        );
        let url = Url::parse(&raw).map_err(|e| Error::invalid_url(raw.clone(), e))?;
        Ok(with_locale(url, &self.config.locale))
    }

    /// Full pipeline: candidates, best match, detail page, ranked items.
    ///
    /// `Ok(None)` when the search page lists no candidates.
    pub async fn search(&mut self, identifier: &str) -> Result<Option<DetailRecord>> {
        let identifier = identifier.trim();
        let (page, candidates) = self.fetch_candidates(identifier).await?;

        let Some(best) = rank::select_best(&candidates, identifier).cloned() else {
            // Exact matches sometimes render the detail page in place of a list.
            if parse::looks_like_detail_page(&page.body) {
                debug!(url = %page.url, "search rendered a detail page directly");
                let mut detail = parse::parse_detail(&page.body, &page.url);
                rank::rank_items(&mut detail.torrents);
                return Ok(Some(detail));
            }
            info!(identifier, "search listed no candidates");
            return Ok(None);
        };
        info!(identifier, jav_id = %best.jav_id, url = %best.detail_url, "selected candidate");

        let mut detail = self
            .fetch_detail(&best.detail_url, Some(page.url.to_string()))
            .await?;
        if detail.jav_id.is_empty() {
            detail.jav_id = best.jav_id.clone();
        }
        if detail.title.is_empty() {
            detail.title = best.title.clone();
        }
        if detail.cover_url.is_none() {
            detail.cover_url = best.cover_url.clone();
        }
        Ok(Some(detail))
    }

    /// Search-results step only. An empty list is a valid answer.
    pub async fn search_candidates(&mut self, identifier: &str) -> Result<Vec<CandidateRecord>> {
        let (_, candidates) = self.fetch_candidates(identifier.trim()).await?;
        Ok(candidates)
    }

    /// Detail fetch and parse for a URL the caller already holds.
    pub async fn get_detail(&mut self, detail_url: &str) -> Result<DetailRecord> {
        self.fetch_detail(detail_url, None).await
    }

    /// Probes each base URL once; never fails.
    pub async fn check_health(&mut self) -> Health {
        let targets: Vec<Target> = self
            .bases
            .iter()
            .map(|b| Target {
                url: with_locale(b.clone(), &self.config.locale),
                referer: None,
            })
            .collect();
        let policy = self.policy.probe();
        match self.fetch_page(&targets, &policy).await {
            Ok(page) => Health {
                healthy: true,
                message: format!("HTTP {}", page.status),
                url: self.bases[page.url_index].to_string(),
            },
            Err(e) => Health {
                healthy: false,
                message: e.to_string(),
                url: self.bases[0].to_string(),
            },
        }
    }

    async fn fetch_candidates(
        &mut self,
        identifier: &str,
    ) -> Result<(Fetched, Vec<CandidateRecord>)> {
        let targets = self
            .bases
            .iter()
            .map(|b| {
                Ok(Target {
                    url: self.search_url(b, identifier)?,
                    referer: Some(root_of(b)),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let policy = self.policy.clone();
        let page = self.fetch_page(&targets, &policy).await?;
        let candidates = parse::parse_search_results(&page.body, &self.bases[page.url_index]);
        info!(identifier, count = candidates.len(), url = %page.url, "parsed search results");
        Ok((page, candidates))
    }

    fn resolve_detail_url(&self, detail_url: &str) -> Result<Url> {
        let trimmed = detail_url.trim();
        if trimmed.is_empty() {
            return Err(Error::invalid_url(detail_url, "empty detail url"));
        }
        match Url::parse(trimmed) {
            Ok(url) => Ok(url),
            Err(_) => self.bases[0]
                .join(trimmed)
                .map_err(|e| Error::invalid_url(detail_url, e)),
        }
    }

    /// The given URL first, then the same path on every other base URL.
    fn detail_targets(&self, url: &Url, referer: Option<String>) -> Vec<Target> {
        let locale = &self.config.locale;
        let mut targets = vec![Target {
            url: with_locale(url.clone(), locale),
            referer: referer.or_else(|| Some(root_of(url))),
        }];
        for base in &self.bases {
            if base.origin() == url.origin() {
                continue;
            }
            let mut mirrored = base.clone();
            mirrored.set_path(url.path());
            mirrored.set_query(url.query());
            targets.push(Target {
                url: with_locale(mirrored, locale),
                referer: Some(root_of(base)),
            });
        }
        targets
    }

    async fn fetch_detail(
        &mut self,
        detail_url: &str,
        referer: Option<String>,
    ) -> Result<DetailRecord> {
        let url = self.resolve_detail_url(detail_url)?;
        let targets = self.detail_targets(&url, referer);
        let policy = self.policy.clone();
        let page = self.fetch_page(&targets, &policy).await?;

        let mut detail = parse::parse_detail(&page.body, &page.url);
        detail.detail_url = url.to_string();
        rank::rank_items(&mut detail.torrents);
        info!(jav_id = %detail.jav_id, items = detail.torrents.len(), "parsed detail page");
        Ok(detail)
    }

    /// Drives [`RetryState`] over `targets` until one attempt succeeds.
    async fn fetch_page(&mut self, targets: &[Target], policy: &RetryPolicy) -> Result<Fetched> {
        let mut state = RetryState::new(targets.len(), policy);
        let mut last_error = String::from("no request was made");
        let timeout = self.config.timeout();

        while let Step::Attempt { url_index, attempt } = state.current() {
            self.cancel.check()?;
            let target = &targets[url_index];
            let host = target.url.host_str().unwrap_or_default().to_string();
            if attempt == 0 {
                self.cookies.seed(&host, &self.config.locale, self.config.extra_cookie.as_deref());
            }

            let delay = policy.delay_for(attempt, &mut rand::thread_rng());
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.cancel.check()?;

            let req = FetchRequest {
                url: target.url.clone(),
                referer: target.referer.clone(),
                cookie_header: self.cookies.header(&host),
                timeout,
                attempt,
            };
            let mut result = self.fetcher.fetch(&req).await;
            self.cookies.merge(&host, std::mem::take(&mut result.cookies));

            let outcome = Outcome::classify(result.status);
            if outcome == Outcome::Success {
                debug!(url = %target.url, attempt, status = result.status, "fetch succeeded");
                return Ok(Fetched {
                    url: target.url.clone(),
                    url_index,
                    status: result.status,
                    body: result.body,
                });
            }

            last_error = format!("{}: {}", target.url, result.describe());
            warn!(
                url = %target.url,
                attempt,
                cycle = state.cycle(),
                status = result.status,
                retryable = outcome == Outcome::Retryable,
                error = %result.describe(),
                "fetch attempt failed"
            );
            state.advance(outcome);
        }

        Err(Error::Exhausted {
            attempts: state.attempts_made(),
            last_error,
        })
    }
}
