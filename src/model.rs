//! Wire types shared by the client (remote metadata client, Upgrader) and the
//! publisher-side index generator. These are serialized verbatim to/from the
//! JSON documents described in the external-interfaces section: `package.json`,
//! `platform.json`, `platforms.json`, `packages.json`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::version::VersionNumber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    Exec,
    Conf,
}

impl PackageType {
    pub fn is_exec(self) -> bool {
        matches!(self, PackageType::Exec)
    }
}

/// The package descriptor: `package.json` in the cache and on the origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageVersion {
    #[serde(rename = "packageName")]
    pub package_name: String,
    #[serde(rename = "packageType")]
    pub package_type: PackageType,
    #[serde(rename = "fileName")]
    pub file_name: String,
    pub os: String,
    pub arch: String,
    pub size: u64,
    pub checksum: String,
    #[serde(rename = "checksumAlgo")]
    pub checksum_algo: String,
    pub sign: String,
    #[serde(rename = "versionId")]
    pub version_id: VersionNumber,
    pub build: String,
    pub description: String,
}

impl PackageVersion {
    /// The structural predicate enforced before any artifact download
    /// (invariant I5 / testable property P4): `fileName` must be non-empty
    /// and not absolute, and `packageType` must already have parsed into one
    /// of the two known variants (a serde rejection handles any other string).
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.file_name.is_empty() {
            return Err(crate::error::Error::Descriptor {
                package: self.package_name.clone(),
                reason: "fileName is empty".into(),
            });
        }
        if std::path::Path::new(&self.file_name).is_absolute() {
            return Err(crate::error::Error::Descriptor {
                package: self.package_name.clone(),
                reason: format!("fileName '{}' is absolute", self.file_name),
            });
        }
        Ok(())
    }

    /// `true` if `fileName` carries a directory component, meaning the
    /// artifact installs under `BaseDir/<fileName>` rather than
    /// `InstallDir/<basename>`.
    pub fn has_directory(&self) -> bool {
        std::path::Path::new(&self.file_name).parent().is_some_and(|p| !p.as_os_str().is_empty())
    }

    pub fn basename(&self) -> &str {
        std::path::Path::new(&self.file_name)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.file_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionAddr {
    #[serde(rename = "versionId")]
    pub version_id: VersionNumber,
    #[serde(rename = "appUrl")]
    pub app_url: String,
    #[serde(rename = "infoUrl")]
    pub info_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformInfo {
    #[serde(rename = "packageName")]
    pub package_name: String,
    pub os: String,
    pub arch: String,
    pub newest: VersionAddr,
    pub versions: Vec<VersionAddr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformId {
    pub os: String,
    pub arch: String,
}

/// A lightweight per-version summary used by listing UIs, carried inline in
/// `platforms.json` under `overviews["{os}-{arch}"]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionOverview {
    #[serde(rename = "versionId")]
    pub version_id: VersionNumber,
    #[serde(rename = "packageType")]
    pub package_type: PackageType,
    #[serde(rename = "fileName")]
    pub file_name: String,
    pub size: u64,
    pub build: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformOverview {
    pub os: String,
    pub arch: String,
    pub newest: VersionOverview,
    pub versions: Vec<VersionOverview>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDirectory {
    #[serde(rename = "packageName")]
    pub package_name: String,
    pub platforms: Vec<PlatformId>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overviews: BTreeMap<String, PlatformOverview>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PackageList {
    pub packages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PackagesOverview {
    pub packages: BTreeMap<String, PackageDirectory>,
}
