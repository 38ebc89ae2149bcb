//! The Upgrader (component F) — the lifecycle core. Every operation here is
//! bound to a single package by construction (`package_name` lives on the
//! struct); the retention sweep is the one exception, documented where it's
//! implemented below.

mod path_installer;
mod selfupgrade;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache;
use crate::config::Config;
use crate::crypto;
use crate::error::{Error, Result};
use crate::fetch;
use crate::log;
use crate::model::PackageVersion;
use crate::remote;
use crate::version::VersionNumber;

pub use path_installer::PathInstaller;
pub use selfupgrade::self_package_name;

/// What `activate_package` actually did. A self-upgrade handoff defers the
/// real file replacement to a detached shell command; the caller (the CLI
/// binary) is expected to exit immediately once it observes this variant, the
/// way the origin implementation calls `os.Exit(0)` right after spawning the
/// handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    Activated,
    SelfUpgradeHandoff,
}

pub struct Upgrader {
    pub cfg: Config,
    pub package_name: String,
}

impl Upgrader {
    pub fn new(package_name: impl Into<String>, cfg: Config) -> Self {
        Self { package_name: package_name.into(), cfg }
    }

    fn load_descriptor(&self, path: &Path) -> Result<PackageVersion> {
        let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| Error::json(path, e))
    }

    fn active_descriptor(&self) -> Option<PackageVersion> {
        let path = cache::active_descriptor_path(&self.cfg, &self.package_name);
        if !path.exists() {
            return None;
        }
        self.load_descriptor(&path).ok()
    }

    /// The active version, or the zero version if no descriptor is recorded
    /// or the recorded one is corrupt. A corrupt descriptor logs a warning
    /// rather than erroring, so upgrades proceed instead of blocking on cache
    /// corruption (see DESIGN.md, Open Question resolution).
    pub fn get_local_version(&self) -> VersionNumber {
        let path = cache::active_descriptor_path(&self.cfg, &self.package_name);
        if !path.exists() {
            return VersionNumber::ZERO;
        }
        match self.load_descriptor(&path) {
            Ok(descriptor) => descriptor.version_id,
            Err(e) => {
                log::warn(&format!(
                    "active descriptor for '{}' is corrupt ({e}); treating as unset",
                    self.package_name
                ));
                VersionNumber::ZERO
            }
        }
    }

    fn cached_artifact_matches(&self, cached: &PackageVersion) -> bool {
        let artifact = cache::artifact_path(&self.cfg, &cached.version_id, cached.basename());
        let Ok((_, md5_hex)) = crypto::file_digest(&artifact) else { return false };
        if md5_hex != cached.checksum {
            return false;
        }
        let Ok(signature) = hex::decode(&cached.sign) else { return false };
        crypto::verify(&self.cfg.public_key, &signature, md5_hex.as_bytes()).is_ok()
    }

    /// Resolve, download, and verify a target version. Returns
    /// `(descriptor, staged)` where `staged == false` means nothing changed
    /// (already active, or caller asked for the version already active).
    pub fn get_package(&self, spec: Option<VersionNumber>) -> Result<(PackageVersion, bool)> {
        let cur_ver = self.get_local_version();
        let active = self.active_descriptor();

        if let Some(spec) = spec {
            if spec == cur_ver {
                if let Some(active) = active.clone() {
                    return Ok((active, false));
                }
            }
        }

        let platform =
            remote::get_platform(&self.cfg.base_url, &self.package_name, &self.cfg.os, &self.cfg.arch)?;

        let target_addr = if let Some(spec) = spec {
            platform
                .versions
                .iter()
                .find(|v| v.version_id == spec)
                .cloned()
                .ok_or_else(|| Error::NotFound {
                    package: self.package_name.clone(),
                    version: spec.to_string(),
                })?
        } else if cur_ver >= platform.newest.version_id {
            match active {
                Some(active) => return Ok((active, false)),
                None => {
                    return Err(Error::NotFound {
                        package: self.package_name.clone(),
                        version: platform.newest.version_id.to_string(),
                    })
                }
            }
        } else {
            platform.newest.clone()
        };

        let target = target_addr.version_id;

        let version_descriptor_path = cache::version_descriptor_path(&self.cfg, &self.package_name, &target);
        if version_descriptor_path.exists() {
            if let Ok(cached) = self.load_descriptor(&version_descriptor_path) {
                if self.cached_artifact_matches(&cached) {
                    return Ok((cached, true));
                }
            }
        }

        let (descriptor, raw_bytes) = remote::get_descriptor(&self.cfg.base_url, &target_addr.info_url)?;
        descriptor.validate()?;

        let artifact_path = cache::artifact_path(&self.cfg, &target, descriptor.basename());
        let app_url = format!("{}{}", self.cfg.base_url, target_addr.app_url);
        fetch::get_file(&app_url, &HashMap::new(), &artifact_path)?;

        let (_, md5_hex) = crypto::file_digest(&artifact_path)?;
        if md5_hex != descriptor.checksum {
            return Err(Error::Integrity {
                package: self.package_name.clone(),
                path: artifact_path,
                expected: descriptor.checksum.clone(),
                actual: md5_hex,
            });
        }
        let signature = hex::decode(&descriptor.sign).map_err(|e| Error::Signature {
            package: self.package_name.clone(),
            reason: format!("sign field is not valid hex: {e}"),
        })?;
        crypto::verify(&self.cfg.public_key, &signature, md5_hex.as_bytes()).map_err(|_| {
            Error::Signature {
                package: self.package_name.clone(),
                reason: "signature does not match checksum under the configured public key".into(),
            }
        })?;

        cache::write_file(&version_descriptor_path, &raw_bytes)?;
        Ok((descriptor, true))
    }

    fn install_target(&self, descriptor: &PackageVersion) -> PathBuf {
        if let Some(target) = &self.cfg.target_path {
            return target.clone();
        }
        if descriptor.has_directory() {
            self.cfg.base_dir.join(&descriptor.file_name)
        } else {
            self.cfg.install_dir.join(descriptor.basename())
        }
    }

    /// Copy the bytes cached for `<name>.json`/`pins/<name>.json` from the
    /// per-version descriptor file already on disk, preserving the exact
    /// signature-covered payload rather than re-serializing the parsed
    /// struct (which would not reproduce byte-identical JSON).
    fn write_active_and_pin(&self, descriptor: &PackageVersion) -> Result<()> {
        let version_descriptor =
            cache::version_descriptor_path(&self.cfg, &descriptor.package_name, &descriptor.version_id);
        let bytes = fs::read(&version_descriptor).map_err(|e| Error::io(&version_descriptor, e))?;
        cache::write_file(&cache::active_descriptor_path(&self.cfg, &descriptor.package_name), &bytes)?;
        cache::write_file(&cache::pin_marker_path(&self.cfg, &descriptor.package_name), &bytes)?;
        Ok(())
    }

    /// Make a cached version active.
    pub fn activate_package(&self, descriptor: &PackageVersion) -> Result<ActivationOutcome> {
        let artifact = cache::artifact_path(&self.cfg, &descriptor.version_id, descriptor.basename());
        let install_target = self.install_target(descriptor);

        if descriptor.package_name == self_package_name() {
            selfupgrade::spawn_handoff(&artifact, &install_target)?;
            self.write_active_and_pin(descriptor)?;
            return Ok(ActivationOutcome::SelfUpgradeHandoff);
        }

        if let Some(parent) = install_target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        cache::remove_file_if_exists(&install_target)?;
        fs::copy(&artifact, &install_target).map_err(|e| Error::io(&install_target, e))?;

        if descriptor.package_type.is_exec() {
            set_executable(&install_target)?;
            let installer = PathInstaller::new(self.cfg.no_set_path);
            installer.ensure_on_path(&self.cfg.install_dir)?;
        }

        self.write_active_and_pin(descriptor)?;
        Ok(ActivationOutcome::Activated)
    }

    /// Resolve, download, verify, and activate in one call. The caller must
    /// inspect the returned `ActivationOutcome` and exit immediately on
    /// `SelfUpgradeHandoff`, the same as after a direct `activate_package`
    /// call — this function does not exit on the caller's behalf.
    pub fn upgrade_package(
        &self,
        spec: Option<VersionNumber>,
    ) -> Result<(PackageVersion, bool, ActivationOutcome)> {
        let (descriptor, staged) = self.get_package(spec)?;
        if !staged {
            return Ok((descriptor, false, ActivationOutcome::Activated));
        }

        let version_descriptor =
            cache::version_descriptor_path(&self.cfg, &descriptor.package_name, &descriptor.version_id);
        let bytes = fs::read(&version_descriptor).map_err(|e| Error::io(&version_descriptor, e))?;
        let todo_path = cache::todo_marker_path(&self.cfg, &descriptor.package_name);
        cache::write_file(&todo_path, &bytes)?;

        let outcome = self.activate_package(&descriptor)?;
        if outcome == ActivationOutcome::Activated {
            cache::remove_file_if_exists(&todo_path)?;
        }
        Ok((descriptor, true, outcome))
    }

    /// Delete a specific cached version, or (if `version` is `None`) the
    /// active install. Missing files are never an error (P7).
    pub fn remove_package(&self, version: Option<VersionNumber>) -> Result<()> {
        match version {
            Some(ver) => {
                let desc_path = cache::version_descriptor_path(&self.cfg, &self.package_name, &ver);
                let basename = self.load_descriptor(&desc_path).ok().map(|d| d.basename().to_string());
                cache::remove_file_if_exists(&desc_path)?;
                let version_dir = cache::version_dir(&self.cfg, &ver);
                match basename {
                    Some(basename) => cache::remove_file_if_exists(&version_dir.join(basename))?,
                    None => best_effort_clear_dir(&version_dir),
                }
                cache::remove_dir_if_empty(&version_dir)?;
            }
            None => {
                let active_path = cache::active_descriptor_path(&self.cfg, &self.package_name);
                if let Ok(descriptor) = self.load_descriptor(&active_path) {
                    let version_dir = cache::version_dir(&self.cfg, &descriptor.version_id);
                    if version_dir.exists() {
                        fs::remove_dir_all(&version_dir).map_err(|e| Error::io(&version_dir, e))?;
                    }
                    let install_target = self.install_target(&descriptor);
                    cache::remove_file_if_exists(&install_target)?;
                }
                cache::remove_file_if_exists(&active_path)?;
            }
        }
        Ok(())
    }

    /// Retention sweep for this package only (see [`cleanup_all`] for the
    /// whole-cache sweep the `cleanup` CLI subcommand runs when invoked with
    /// no package name).
    pub fn cleanup_old_versions(&self) -> Result<()> {
        cleanup_group(&self.cfg, &self.package_name)
    }
}

/// Retention depth: how many newest per-version descriptors survive a sweep.
pub const RETENTION_KEEP: usize = 3;

/// Run the retention sweep for one package's group of cached versions,
/// grouped by reading every `<name>-<ver>.json` in `package_dir`, not by any
/// in-memory state — so this is a plain function of `Config`, not an
/// `Upgrader` method restricted to one already-loaded package.
pub fn cleanup_group(cfg: &Config, package_name: &str) -> Result<()> {
    let mut versions: Vec<VersionNumber> = cache::list_version_descriptors(cfg)
        .into_iter()
        .filter(|(name, _)| name == package_name)
        .map(|(_, version)| version)
        .collect();
    versions.sort_by(|a, b| b.cmp(a));

    for stale in versions.into_iter().skip(RETENTION_KEEP) {
        let desc_path = cache::version_descriptor_path(cfg, package_name, &stale);
        cache::remove_file_if_exists(&desc_path)?;
        let version_dir = cache::version_dir(cfg, &stale);
        best_effort_clear_dir(&version_dir);
        cache::remove_dir_if_empty(&version_dir)?;
    }
    Ok(())
}

/// Retention sweep across every package present in `package_dir` — what the
/// `cleanup` CLI subcommand runs when no specific package name is given.
pub fn cleanup_all(cfg: &Config) -> Result<()> {
    let mut names: Vec<String> = cache::list_version_descriptors(cfg).into_iter().map(|(n, _)| n).collect();
    names.sort();
    names.dedup();
    for name in names {
        cleanup_group(cfg, &name)?;
    }
    Ok(())
}

fn best_effort_clear_dir(dir: &Path) {
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let _ = fs::remove_file(entry.path());
        }
    }
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path).map_err(|e| Error::io(path, e))?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).map_err(|e| Error::io(path, e))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}
