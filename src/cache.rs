//! Cache layout (component D): directory and file naming for the per-package,
//! per-version cache, plus the pinned/todo marker directories.
//!
//! ```text
//! base_dir/
//!   bin/                        install_dir
//!   package/                    package_dir
//!     <name>.json               active descriptor
//!     <name>-<ver>.json         cached descriptor for one version
//!     <ver>/<basename>          cached artifact file
//!     pins/<name>.json          last-activated marker
//!     todos/<name>.json         in-progress marker
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::version::VersionNumber;

/// Path to the active descriptor `<package_dir>/<name>.json`.
pub fn active_descriptor_path(cfg: &Config, name: &str) -> PathBuf {
    cfg.package_dir.join(format!("{name}.json"))
}

/// Path to a per-version descriptor `<package_dir>/<name>-<ver>.json`.
pub fn version_descriptor_path(cfg: &Config, name: &str, version: &VersionNumber) -> PathBuf {
    cfg.package_dir.join(format!("{name}-{version}.json"))
}

/// Path to a per-version cache directory `<package_dir>/<ver>/`.
pub fn version_dir(cfg: &Config, version: &VersionNumber) -> PathBuf {
    cfg.package_dir.join(version.to_string())
}

/// Path to a cached artifact `<package_dir>/<ver>/<basename>`.
pub fn artifact_path(cfg: &Config, version: &VersionNumber, basename: &str) -> PathBuf {
    version_dir(cfg, version).join(basename)
}

pub fn pins_dir(cfg: &Config) -> PathBuf {
    cfg.package_dir.join("pins")
}

pub fn todos_dir(cfg: &Config) -> PathBuf {
    cfg.package_dir.join("todos")
}

pub fn pin_marker_path(cfg: &Config, name: &str) -> PathBuf {
    pins_dir(cfg).join(format!("{name}.json"))
}

pub fn todo_marker_path(cfg: &Config, name: &str) -> PathBuf {
    todos_dir(cfg).join(format!("{name}.json"))
}

/// Write `bytes` to `path`, creating parent directories first.
pub fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::write(path, bytes).map_err(|e| Error::io(path, e))
}

/// `true` if `dir` exists and has no entries (used by retention/remove to
/// decide whether a per-version directory can be deleted after its artifact
/// is gone).
pub fn is_empty_dir(dir: &Path) -> bool {
    match fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => false,
    }
}

/// Remove `dir` if it exists and is empty; a missing or non-empty directory
/// is not an error (idempotence, matched by `remove_package`/retention).
pub fn remove_dir_if_empty(dir: &Path) -> Result<()> {
    if dir.exists() && is_empty_dir(dir) {
        fs::remove_dir(dir).map_err(|e| Error::io(dir, e))?;
    }
    Ok(())
}

/// Remove a file if present; a missing file is not an error.
pub fn remove_file_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).map_err(|e| Error::io(path, e))?;
    }
    Ok(())
}

/// List every `<name>-<ver>.json` in `package_dir`, parsed into
/// `(package_name, version)` pairs. Used by the cleanup sweep and by
/// `pacm-get list` to enumerate cached versions for every package at once.
pub fn list_version_descriptors(cfg: &Config) -> Vec<(String, VersionNumber)> {
    let mut out = Vec::new();
    let Ok(entries) = fs::read_dir(&cfg.package_dir) else {
        return out;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else { continue };
        if ext != "json" {
            continue;
        }
        let Some((name, ver_str)) = stem.rsplit_once('-') else { continue };
        let Ok(version) = VersionNumber::parse(ver_str) else { continue };
        out.push((name.to_string(), version));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigOverrides;
    use crate::tests::support::DataHomeGuard;

    fn test_config(guard: &DataHomeGuard) -> Config {
        Config::resolve(ConfigOverrides {
            base_dir: Some(guard.base_dir()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn paths_follow_the_documented_layout() {
        let guard = DataHomeGuard::new();
        let cfg = test_config(&guard);
        let v = VersionNumber::new(1, 2, 0);
        assert_eq!(active_descriptor_path(&cfg, "svc"), cfg.package_dir.join("svc.json"));
        assert_eq!(
            version_descriptor_path(&cfg, "svc", &v),
            cfg.package_dir.join("svc-1.2.0.json")
        );
        assert_eq!(version_dir(&cfg, &v), cfg.package_dir.join("1.2.0"));
        assert_eq!(artifact_path(&cfg, &v, "svc"), cfg.package_dir.join("1.2.0").join("svc"));
        assert_eq!(pin_marker_path(&cfg, "svc"), cfg.package_dir.join("pins").join("svc.json"));
        assert_eq!(todo_marker_path(&cfg, "svc"), cfg.package_dir.join("todos").join("svc.json"));
    }

    #[test]
    fn remove_dir_if_empty_is_idempotent() {
        let guard = DataHomeGuard::new();
        let cfg = test_config(&guard);
        let dir = version_dir(&cfg, &VersionNumber::new(1, 0, 0));
        fs::create_dir_all(&dir).unwrap();
        remove_dir_if_empty(&dir).unwrap();
        assert!(!dir.exists());
        remove_dir_if_empty(&dir).unwrap();
    }

    #[test]
    fn remove_dir_if_empty_leaves_non_empty_dirs() {
        let guard = DataHomeGuard::new();
        let cfg = test_config(&guard);
        let dir = version_dir(&cfg, &VersionNumber::new(1, 0, 0));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("artifact"), b"x").unwrap();
        remove_dir_if_empty(&dir).unwrap();
        assert!(dir.exists());
    }

    #[test]
    fn list_version_descriptors_parses_name_and_version() {
        let guard = DataHomeGuard::new();
        let cfg = test_config(&guard);
        fs::create_dir_all(&cfg.package_dir).unwrap();
        fs::write(cfg.package_dir.join("svc-1.0.0.json"), b"{}").unwrap();
        fs::write(cfg.package_dir.join("svc-1.2.0.json"), b"{}").unwrap();
        fs::write(cfg.package_dir.join("svc.json"), b"{}").unwrap();
        fs::write(cfg.package_dir.join("other-2.0.0.json"), b"{}").unwrap();
        let mut found = list_version_descriptors(&cfg);
        found.sort_by(|a, b| (a.0.as_str(), a.1).cmp(&(b.0.as_str(), b.1)));
        assert_eq!(
            found,
            vec![
                ("other".to_string(), VersionNumber::new(2, 0, 0)),
                ("svc".to_string(), VersionNumber::new(1, 0, 0)),
                ("svc".to_string(), VersionNumber::new(1, 2, 0)),
            ]
        );
    }
}
