//! Per-host session cookies and their jar-file form.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Content-gate acknowledgment sent on first contact with every host.
pub const CONSENT_COOKIE: (&str, &str) = ("over18", "1");
/// Name of the locale preference cookie; its value comes from the config.
pub const LOCALE_COOKIE: &str = "locale";

/// `host -> ordered (name, value)` cookie map.
///
/// Hosts are seeded lazily the first time they are contacted. Nothing is
/// shared between hosts.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    hosts: HashMap<String, Vec<(String, String)>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds `host` with the fixed cookies plus any `extra` pairs.
    ///
    /// Returns `false` when the host was already seeded.
    pub fn seed(&mut self, host: &str, locale: &str, extra: Option<&str>) -> bool {
        if self.hosts.contains_key(host) {
            return false;
        }
        let mut cookies = default_cookies(locale);
        if let Some(raw) = extra {
            for (name, value) in parse_cookie_header(raw) {
                upsert(&mut cookies, name, value);
            }
        }
        debug!(host, count = cookies.len(), "seeded cookie jar");
        self.hosts.insert(host.to_string(), cookies);
        true
    }

    pub fn set(&mut self, host: &str, name: &str, value: &str) {
        let cookies = self.hosts.entry(host.to_string()).or_default();
        upsert(cookies, name.to_string(), value.to_string());
    }

    pub fn merge<I>(&mut self, host: &str, cookies: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let entry = self.hosts.entry(host.to_string()).or_default();
        for (name, value) in cookies {
            upsert(entry, name, value);
        }
    }

    pub fn get(&self, host: &str, name: &str) -> Option<&str> {
        self.hosts
            .get(host)?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// `Cookie` header value for `host`, if it has any cookies.
    pub fn header(&self, host: &str) -> Option<String> {
        let cookies = self.hosts.get(host)?;
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(|(n, v)| format!("{}={}", n, v))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

fn default_cookies(locale: &str) -> Vec<(String, String)> {
    vec![
        (CONSENT_COOKIE.0.to_string(), CONSENT_COOKIE.1.to_string()),
        (LOCALE_COOKIE.to_string(), locale.to_string()),
    ]
}

fn upsert(cookies: &mut Vec<(String, String)>, name: String, value: String) {
    match cookies.iter_mut().find(|(n, _)| *n == name) {
        Some(existing) => existing.1 = value,
        None => cookies.push((name, value)),
    }
}

/// Splits `a=b; c=d` into pairs, skipping malformed fragments.
pub fn parse_cookie_header(raw: &str) -> Vec<(String, String)> {
    raw.split(';')
        .filter_map(|part| {
            let (name, value) = part.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Jar file location for `host` under `dir`.
pub fn jar_path(dir: &Path, host: &str) -> PathBuf {
    let safe: String = host
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    dir.join(format!("{}.cookies.txt", safe))
}

/// Creates the jar file for `host` with the default cookies if it is missing.
pub fn ensure_jar_file(path: &Path, host: &str, locale: &str) -> std::io::Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, to_netscape(host, &default_cookies(locale)))
}

/// Renders cookies in the Netscape jar format understood by curl.
pub fn to_netscape(host: &str, cookies: &[(String, String)]) -> String {
    let mut out = String::from("# Netscape HTTP Cookie File\n");
    for (name, value) in cookies {
        out.push_str(&format!(".{}\tTRUE\t/\tFALSE\t0\t{}\t{}\n", host, name, value));
    }
    out
}

/// Reads `(name, value)` pairs back out of a Netscape jar file.
pub fn parse_netscape(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.strip_prefix("#HttpOnly_").unwrap_or(line);
            if line.trim().is_empty() || line.starts_with('#') {
                return None;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 7 {
                return None;
            }
            Some((fields[5].to_string(), fields[6].trim_end().to_string()))
        })
        .collect()
}
