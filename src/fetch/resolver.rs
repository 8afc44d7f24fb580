//! Locates a browser-impersonating curl build and decides how to launch it.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::Config;

/// Generic build that takes the profile as `--impersonate <profile>`.
pub const GENERIC_BINARY: &str = "curl-impersonate";
/// Bridge used on Windows to run a Linux build.
pub const WSL_PROGRAM: &str = "wsl.exe";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Windows,
    Unix,
}

impl HostOs {
    pub fn current() -> Self {
        if cfg!(windows) {
            HostOs::Windows
        } else {
            HostOs::Unix
        }
    }
}

/// How file paths must be written on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStyle {
    Native,
    /// `C:\a\b` becomes `/mnt/c/a/b`.
    Wsl,
}

impl PathStyle {
    pub fn render(&self, path: &Path) -> String {
        match self {
            PathStyle::Native => path.display().to_string(),
            PathStyle::Wsl => to_wsl_path(&path.display().to_string()),
        }
    }
}

/// Program, leading arguments and path convention for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    pub program: PathBuf,
    pub prefix_args: Vec<String>,
    pub path_style: PathStyle,
}

impl Launch {
    pub fn direct(path: &Path) -> Self {
        Self {
            program: path.to_path_buf(),
            prefix_args: Vec::new(),
            path_style: PathStyle::Native,
        }
    }

    pub fn wsl(path: &Path) -> Self {
        Self {
            program: PathBuf::from(WSL_PROGRAM),
            prefix_args: vec!["-e".to_string(), PathStyle::Wsl.render(path)],
            path_style: PathStyle::Wsl,
        }
    }

    pub fn is_bridged(&self) -> bool {
        self.path_style == PathStyle::Wsl
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBinary {
    pub path: PathBuf,
    pub use_profile_flag: bool,
    pub launch: Launch,
}

/// Filesystem probe for impersonation executables.
#[derive(Debug, Clone)]
pub struct Resolver {
    pub host: HostOs,
    pub vendor_dirs: Vec<PathBuf>,
    /// Also consult `PATH`.
    pub search_path: bool,
}

impl Resolver {
    pub fn from_config(config: &Config) -> Self {
        Self {
            host: HostOs::current(),
            vendor_dirs: config.vendor_dirs.clone(),
            search_path: true,
        }
    }

    /// Resolution order: configured path, generic build (non-Windows),
    /// profile wrapper, then on Windows a Linux build through WSL.
    pub fn resolve(&self, profile: &str, configured: Option<&Path>) -> Option<ResolvedBinary> {
        if let Some(path) = configured {
            if path.is_file() {
                debug!(path = %path.display(), "using configured impersonation binary");
                return Some(ResolvedBinary {
                    path: path.to_path_buf(),
                    use_profile_flag: takes_profile_flag(path),
                    launch: Launch::direct(path),
                });
            }
            debug!(path = %path.display(), "configured impersonation binary does not exist");
        }

        if self.host == HostOs::Unix {
            if let Some(path) = self.find(GENERIC_BINARY) {
                return Some(ResolvedBinary {
                    launch: Launch::direct(&path),
                    path,
                    use_profile_flag: true,
                });
            }
        }

        let wrapper = format!("curl_{}", profile);
        let wrapper_names: Vec<String> = match self.host {
            HostOs::Windows => ["exe", "bat", "cmd"]
                .iter()
                .map(|ext| format!("{}.{}", wrapper, ext))
                .collect(),
            HostOs::Unix => vec![wrapper.clone()],
        };
        for name in &wrapper_names {
            if let Some(path) = self.find(name) {
                return Some(ResolvedBinary {
                    launch: Launch::direct(&path),
                    path,
                    use_profile_flag: false,
                });
            }
        }

        if self.host == HostOs::Windows {
            // Only vendored copies: a Linux build is never on the Windows PATH.
            for (name, flag) in [(GENERIC_BINARY, true), (wrapper.as_str(), false)] {
                if let Some(path) = self.find_vendored(name) {
                    debug!(path = %path.display(), "bridging linux binary through wsl");
                    return Some(ResolvedBinary {
                        launch: Launch::wsl(&path),
                        path,
                        use_profile_flag: flag,
                    });
                }
            }
        }
        None
    }

    fn find(&self, name: &str) -> Option<PathBuf> {
        self.find_vendored(name).or_else(|| {
            if self.search_path {
                which::which(name).ok()
            } else {
                None
            }
        })
    }

    fn find_vendored(&self, name: &str) -> Option<PathBuf> {
        self.vendor_dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|p| p.is_file())
    }
}

fn takes_profile_flag(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.starts_with(GENERIC_BINARY))
        .unwrap_or(false)
}

/// Translates a Windows path into its `/mnt/<drive>` form.
pub fn to_wsl_path(path: &str) -> String {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        let drive = (bytes[0] as char).to_ascii_lowercase();
        let rest = path[2..].replace('\\', "/");
        let rest = rest.trim_start_matches('/');
        if rest.is_empty() {
            format!("/mnt/{}", drive)
        } else {
            format!("/mnt/{}/{}", drive, rest)
        }
    } else {
        path.replace('\\', "/")
    }
}
