//! Config store (component H): read-only getters for the fields the
//! Upgrader needs, with defaults filled in the way the origin implementation's
//! `correctConfig` fills an `UpgradeConfig` — empty fields only, never
//! clobbering an explicit override.

use std::env;
use std::path::PathBuf;

/// The origin's embedded trust anchor. Overridable per invocation with
/// `--public <file>`; the private counterpart is used only by publisher-side
/// signing tooling and is never compiled into this binary.
pub const DEFAULT_PUBLIC_KEY_PEM: &str = r#"-----BEGIN PUBLIC KEY-----
MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEAwClPrRPGCOXcWPFMPIPc
Hn5angPRwuIvwSGle/O7VaZfaTuplMVa2wUPzWv1AfmKpENMm0pf0uhnTyfH3gnR
C46rNeMmBcLg8Jd7wTWXtik0IN7CREOQ6obIiMY4Sbx25EPHPf8SeqvPpFq8uOEM
YqRUQbPaY5+mgkDZMy68hJDUUstapBQovjSlnLXjG2pULWKIJF2g0gGWvS4LGznP
Uvrq2U1QVpsja3EtoLq8jF3UcLJWVZt2pMd5H9m3ULBKFzpu7ix+wb3ebRr6JtUI
bMzLAZ0BM0wxlpDmp1GYVag+Ll3w2o3LXLEB08soABD0wdD03Sp7flkbebgAxd1b
vwIDAQAB
-----END PUBLIC KEY-----"#;

pub const DEFAULT_BASE_URL: &str = "https://packages.example.invalid/costrict";

const DIR_NAME: &str = ".costrict";

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub base_dir: PathBuf,
    pub install_dir: PathBuf,
    pub package_dir: PathBuf,
    pub public_key: String,
    pub os: String,
    pub arch: String,
    pub no_set_path: bool,
    pub target_path: Option<PathBuf>,
}

/// Overrides gathered from CLI flags; any field left `None` falls back to an
/// environment variable and then a compiled-in default.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub base_dir: Option<PathBuf>,
    pub install_dir: Option<PathBuf>,
    pub package_dir: Option<PathBuf>,
    pub public_key_file: Option<PathBuf>,
    pub os: Option<String>,
    pub arch: Option<String>,
    pub no_set_path: bool,
    pub target_path: Option<PathBuf>,
}

fn env_or(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.is_empty())
}

fn default_base_dir() -> PathBuf {
    if let Some(over) = env_or("PACM_GET_BASE_DIR") {
        return PathBuf::from(over);
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(DIR_NAME)
}

impl Config {
    /// Build a `Config`, filling anything the caller left empty from
    /// environment variables and then built-in defaults, mirroring the
    /// origin implementation's "correct empty fields in place" behavior.
    pub fn resolve(overrides: ConfigOverrides) -> crate::error::Result<Config> {
        let base_dir = overrides.base_dir.unwrap_or_else(default_base_dir);
        let install_dir = overrides.install_dir.unwrap_or_else(|| base_dir.join("bin"));
        let package_dir = overrides.package_dir.unwrap_or_else(|| base_dir.join("package"));
        let base_url = overrides
            .base_url
            .or_else(|| env_or("PACM_GET_BASE_URL"))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let public_key = match overrides.public_key_file {
            Some(path) => std::fs::read_to_string(&path).map_err(|e| crate::error::Error::io(&path, e))?,
            None => env_or("PACM_GET_PUBLIC_KEY_FILE")
                .map(|path| std::fs::read_to_string(&path))
                .transpose()
                .map_err(|e| crate::error::Error::io("PACM_GET_PUBLIC_KEY_FILE", e))?
                .unwrap_or_else(|| DEFAULT_PUBLIC_KEY_PEM.to_string()),
        };
        let os = overrides.os.unwrap_or_else(|| std::env::consts::OS.to_string());
        let arch = overrides.arch.unwrap_or_else(|| std::env::consts::ARCH.to_string());

        Ok(Config {
            base_url,
            base_dir,
            install_dir,
            package_dir,
            public_key,
            os,
            arch,
            no_set_path: overrides.no_set_path,
            target_path: overrides.target_path,
        })
    }
}
