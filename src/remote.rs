//! Remote metadata client (component E): typed fetchers over the origin's
//! `packages.json` / `<name>/platforms.json` / `<name>/<os>/<arch>/platform.json`
//! / per-version `package.json` documents. Every URL is anchored at
//! `base_url`; relative URLs found inside metadata (they begin with `/`) are
//! concatenated verbatim, never re-resolved.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::fetch;
use crate::model::{PackageDirectory, PackageList, PackageVersion, PlatformInfo};

fn get_json<T: serde::de::DeserializeOwned>(url: &str) -> Result<T> {
    let bytes = fetch::get_bytes(url, &HashMap::new())?;
    serde_json::from_slice(&bytes).map_err(|e| Error::json(url, e))
}

pub fn get_packages(base_url: &str) -> Result<PackageList> {
    get_json(&format!("{base_url}/packages.json"))
}

pub fn get_platforms(base_url: &str, package_name: &str) -> Result<PackageDirectory> {
    get_json(&format!("{base_url}/{package_name}/platforms.json"))
}

pub fn get_platform(base_url: &str, package_name: &str, os: &str, arch: &str) -> Result<PlatformInfo> {
    get_json(&format!("{base_url}/{package_name}/{os}/{arch}/platform.json"))
}

/// Fetch a specific version's descriptor bytes (not yet parsed) from
/// `info_url`, a path relative to `base_url`. The raw bytes are what
/// `get_package` persists to the cache verbatim — re-serializing the parsed
/// struct would not reproduce the exact signed payload.
pub fn get_descriptor_bytes(base_url: &str, info_url: &str) -> Result<Vec<u8>> {
    fetch::get_bytes(&format!("{base_url}{info_url}"), &HashMap::new())
}

pub fn get_descriptor(base_url: &str, info_url: &str) -> Result<(PackageVersion, Vec<u8>)> {
    let bytes = get_descriptor_bytes(base_url, info_url)?;
    let descriptor: PackageVersion =
        serde_json::from_slice(&bytes).map_err(|e| Error::json(info_url, e))?;
    Ok((descriptor, bytes))
}
