use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;

use super::resolver::ResolvedBinary;
use super::{FetchRequest, FetchResult, Fetcher};
use crate::config::Config;
use crate::cookies;
use crate::error::Result;

/// Appended to stdout by curl's `-w` so the status can be split off the body.
pub const STATUS_MARKER: &str = "__AV_HTTP_STATUS__:";

const MAX_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Extra time granted past `--max-time` before the child is killed.
const KILL_GRACE: Duration = Duration::from_secs(2);

enum JarDir {
    Owned(TempDir),
    Configured(PathBuf),
}

impl JarDir {
    fn path(&self) -> &Path {
        match self {
            JarDir::Owned(t) => t.path(),
            JarDir::Configured(p) => p,
        }
    }
}

/// Runs the impersonation executable once per request.
pub struct ProcessFetcher {
    binary: ResolvedBinary,
    profile: String,
    ca_bundle: Option<PathBuf>,
    proxy: Option<String>,
    locale: String,
    jar_dir: JarDir,
}

impl ProcessFetcher {
    pub fn new(binary: ResolvedBinary, config: &Config) -> Result<Self> {
        let jar_dir = match &config.cookie_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                JarDir::Configured(dir.clone())
            }
            None => JarDir::Owned(tempfile::Builder::new().prefix("av-cookies").tempdir()?),
        };
        Ok(Self {
            binary,
            profile: config.impersonate_profile.clone(),
            ca_bundle: config.ca_bundle.clone(),
            proxy: config.proxy.clone(),
            locale: config.locale.clone(),
            jar_dir,
        })
    }

    pub fn jar_dir(&self) -> &Path {
        self.jar_dir.path()
    }
}

/// Argument list for one invocation, without the launch prefix.
pub fn build_args(
    binary: &ResolvedBinary,
    profile: &str,
    req: &FetchRequest,
    jar: &Path,
    ca_bundle: Option<&Path>,
    proxy: Option<&str>,
) -> Vec<String> {
    let style = binary.launch.path_style;
    let total = req.timeout.as_secs().max(1);
    let connect = total.min(MAX_CONNECT_TIMEOUT_SECS);
    let mut args: Vec<String> = Vec::new();
    if binary.use_profile_flag {
        args.extend(["--impersonate".to_string(), profile.to_string()]);
    }
    args.extend(["-s", "-L", "--compressed", "--http2", "-w"].iter().map(|s| s.to_string()));
    args.push(format!("\\n{}%{{http_code}}", STATUS_MARKER));
    args.extend(["--connect-timeout".to_string(), connect.to_string()]);
    args.extend(["--max-time".to_string(), total.to_string()]);
    // A host path means nothing inside the bridge.
    if let Some(ca) = ca_bundle.filter(|_| !binary.launch.is_bridged()) {
        args.extend(["--cacert".to_string(), style.render(ca)]);
    }
    if let Some(proxy) = proxy {
        args.extend(["-x".to_string(), proxy.to_string()]);
    }
    if let Some(referer) = &req.referer {
        args.extend(["-e".to_string(), referer.clone()]);
    }
    if let Some(cookie) = &req.cookie_header {
        args.extend(["-H".to_string(), format!("Cookie: {}", cookie)]);
    }
    let jar = style.render(jar);
    args.extend(["-b".to_string(), jar.clone(), "-c".to_string(), jar]);
    args.push(req.url.to_string());
    args
}

/// Splits curl stdout into `(status, body)` using the trailing marker.
pub fn parse_status_marker(stdout: &str) -> Option<(u16, String)> {
    let idx = stdout.rfind(STATUS_MARKER)?;
    let code: String = stdout[idx + STATUS_MARKER.len()..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let status = code.parse::<u16>().ok()?;
    let body = stdout[..idx].strip_suffix('\n').unwrap_or(&stdout[..idx]);
    let body = body.strip_suffix('\r').unwrap_or(body);
    Some((status, body.to_string()))
}

#[async_trait]
impl Fetcher for ProcessFetcher {
    fn name(&self) -> &str {
        "process"
    }

    async fn fetch(&self, req: &FetchRequest) -> FetchResult {
        let host = req.host();
        let jar = cookies::jar_path(self.jar_dir(), &host);
        if let Err(e) = cookies::ensure_jar_file(&jar, &host, &self.locale) {
            return FetchResult::transport(format!(
                "cannot create cookie jar {}: {}",
                jar.display(),
                e
            ));
        }

        let args = build_args(
            &self.binary,
            &self.profile,
            req,
            &jar,
            self.ca_bundle.as_deref(),
            self.proxy.as_deref(),
        );
        let launch = &self.binary.launch;
        debug!(
            program = %launch.program.display(),
            url = %req.url,
            attempt = req.attempt,
            "spawning impersonation fetch"
        );

        let mut cmd = Command::new(&launch.program);
        cmd.args(&launch.prefix_args)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                return FetchResult::transport(format!(
                    "failed to spawn {}: {}",
                    launch.program.display(),
                    e
                ))
            }
        };

        // Dropping the wait future on timeout drops the child, which kills it.
        let deadline = req.timeout + KILL_GRACE;
        let output = match tokio::time::timeout(deadline, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return FetchResult::transport(format!("waiting for fetch process failed: {}", e))
            }
            Err(_) => {
                return FetchResult::transport(format!(
                    "fetch process timed out after {:?}",
                    deadline
                ))
            }
        };

        let jar_cookies = std::fs::read_to_string(&jar)
            .map(|c| cookies::parse_netscape(&c))
            .unwrap_or_default();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let mut result = FetchResult::transport(format!(
                "fetch process exited with {}: {}",
                output.status.code().map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()),
                stderr.trim()
            ));
            result.cookies = jar_cookies;
            return result;
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_status_marker(&stdout) {
            Some((status, body)) => FetchResult {
                status,
                body,
                error: None,
                cookies: jar_cookies,
            },
            None => {
                let mut result =
                    FetchResult::transport("fetch process output had no status marker");
                result.cookies = jar_cookies;
                result
            }
        }
    }
}
