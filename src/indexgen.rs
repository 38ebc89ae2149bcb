//! Index generator (component G): the publisher-side counterpart to
//! `remote.rs` — walks a build directory, clusters every discovered
//! `package.json` by (package, os, arch, version), and emits the
//! `platform.json` / `platforms.json` / `packages.json` documents the client
//! fetches at runtime.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::cache::write_file;
use crate::error::{Error, Result};
use crate::log;
use crate::model::{
    PackageDirectory, PackageList, PackageVersion, PackagesOverview, PlatformId, PlatformInfo,
    PlatformOverview, VersionAddr, VersionOverview,
};
use crate::version::VersionNumber;

#[derive(Debug, Clone, Copy, Default)]
pub struct IndexOptions {
    pub emit_packages: bool,
    pub emit_overview: bool,
}

#[derive(Debug, Default)]
pub struct GeneratedIndex {
    pub platforms_written: usize,
    pub platform_dirs_written: usize,
    pub packages_written: bool,
    pub overview_written: bool,
    pub skipped: Vec<PathBuf>,
}

struct PlatformGroup {
    dir: PathBuf,
    versions: Vec<PackageVersion>,
}

struct PackageGroup {
    platforms_dir: PathBuf,
    platforms: BTreeMap<(String, String), PlatformGroup>,
}

/// Walk `build_root`, parse every `package.json` found, and write the
/// derived index files. Descriptors are grouped by (`packageName`, `os`,
/// `arch`), but each group's *output directory* is derived from the real
/// filesystem location of the first `package.json` discovered for that
/// group — two ancestors up for the platform directory, four up for the
/// package directory, matching the on-disk `<package>/<os>/<arch>/<ver>/
/// package.json` layout — never rebuilt from the descriptor's own strings.
/// A descriptor's `packageName`/`os`/`arch` fields can therefore never claim
/// an output location its file didn't actually occupy.
pub fn generate(build_root: &Path, options: IndexOptions) -> Result<GeneratedIndex> {
    let mut packages: BTreeMap<String, PackageGroup> = BTreeMap::new();

    for entry in WalkDir::new(build_root).into_iter().filter_map(|e| e.ok()) {
        if entry.file_name() != "package.json" {
            continue;
        }
        let path = entry.path();
        let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
        let descriptor: PackageVersion = match serde_json::from_slice(&bytes) {
            Ok(d) => d,
            Err(e) => {
                log::warn(&format!("skipping malformed descriptor at {}: {e}", path.display()));
                continue;
            }
        };
        let (Some(platform_dir), Some(platforms_dir)) = (nth_ancestor(path, 2), nth_ancestor(path, 4)) else {
            log::warn(&format!("skipping {}: not deep enough under the build root", path.display()));
            continue;
        };

        let package = packages
            .entry(descriptor.package_name.clone())
            .or_insert_with(|| PackageGroup { platforms_dir, platforms: BTreeMap::new() });
        let platform = package
            .platforms
            .entry((descriptor.os.clone(), descriptor.arch.clone()))
            .or_insert_with(|| PlatformGroup { dir: platform_dir, versions: Vec::new() });
        platform.versions.push(descriptor);
    }

    let mut result = GeneratedIndex::default();
    let mut overview_by_package: BTreeMap<String, PackageDirectory> = BTreeMap::new();

    for (package_name, group) in packages {
        let mut platform_ids = Vec::with_capacity(group.platforms.len());
        let mut overviews = BTreeMap::new();

        for ((os, arch), mut platform) in group.platforms {
            platform.versions.sort_by(|a, b| a.version_id.cmp(&b.version_id));

            if !is_subdirectory(build_root, &platform.dir) {
                log::warn(&format!(
                    "skipping {package_name}/{os}/{arch}: platform directory {} escapes the build root",
                    platform.dir.display()
                ));
                result.skipped.push(platform.dir);
                continue;
            }

            let version_addrs: Vec<VersionAddr> = platform
                .versions
                .iter()
                .map(|d| VersionAddr {
                    version_id: d.version_id,
                    app_url: format!("/{package_name}/{os}/{arch}/{}/{}", d.version_id, d.basename()),
                    info_url: format!("/{package_name}/{os}/{arch}/{}/package.json", d.version_id),
                })
                .collect();
            let newest_version =
                platform.versions.iter().map(|d| d.version_id).max().unwrap_or(VersionNumber::ZERO);
            let newest_addr = version_addrs
                .iter()
                .find(|addr| addr.version_id == newest_version)
                .cloned()
                .expect("newest_version was derived from the same descriptor set");

            let platform_info = PlatformInfo {
                package_name: package_name.clone(),
                os: os.clone(),
                arch: arch.clone(),
                newest: newest_addr,
                versions: version_addrs,
            };
            let path = platform.dir.join("platform.json");
            let bytes = serde_json::to_vec_pretty(&platform_info).map_err(|e| Error::json(&path, e))?;
            write_file(&path, &bytes)?;
            result.platform_dirs_written += 1;

            platform_ids.push(PlatformId { os: os.clone(), arch: arch.clone() });
            if options.emit_overview {
                overviews.insert(format!("{os}-{arch}"), platform_overview(&os, &arch, &platform.versions));
            }
        }

        if !is_subdirectory(build_root, &group.platforms_dir) {
            log::warn(&format!(
                "skipping platforms.json for '{package_name}': {} escapes the build root",
                group.platforms_dir.display()
            ));
            result.skipped.push(group.platforms_dir);
            continue;
        }

        let directory = PackageDirectory { package_name: package_name.clone(), platforms: platform_ids, overviews };
        let path = group.platforms_dir.join("platforms.json");
        let bytes = serde_json::to_vec_pretty(&directory).map_err(|e| Error::json(&path, e))?;
        write_file(&path, &bytes)?;
        result.platforms_written += 1;
        overview_by_package.insert(package_name, directory);
    }

    if options.emit_packages {
        let packages = PackageList { packages: overview_by_package.keys().cloned().collect() };
        let path = build_root.join("packages.json");
        let bytes = serde_json::to_vec_pretty(&packages).map_err(|e| Error::json(&path, e))?;
        write_file(&path, &bytes)?;
        result.packages_written = true;
    }

    if options.emit_overview {
        let overview = PackagesOverview { packages: overview_by_package };
        let path = build_root.join("packages-overview.json");
        let bytes = serde_json::to_vec_pretty(&overview).map_err(|e| Error::json(&path, e))?;
        write_file(&path, &bytes)?;
        result.overview_written = true;
    }

    Ok(result)
}

fn platform_overview(os: &str, arch: &str, versions: &[PackageVersion]) -> PlatformOverview {
    let summaries: Vec<VersionOverview> = versions
        .iter()
        .map(|d| VersionOverview {
            version_id: d.version_id,
            package_type: d.package_type,
            file_name: d.file_name.clone(),
            size: d.size,
            build: d.build.clone(),
            description: d.description.clone(),
        })
        .collect();
    let newest = summaries
        .iter()
        .max_by_key(|v| v.version_id)
        .cloned()
        .expect("platform_overview is only called with a non-empty version list");
    PlatformOverview { os: os.to_string(), arch: arch.to_string(), newest, versions: summaries }
}

/// Mutate an existing `platform.json`'s `newest` pointer to `version`,
/// without touching `versions[]`. `version` must already appear there — this
/// is an override of which already-published version upgrades resolve to,
/// not a way to publish a new one.
pub fn set_newest(platform_json_path: &Path, version: VersionNumber) -> Result<()> {
    let bytes = fs::read(platform_json_path).map_err(|e| Error::io(platform_json_path, e))?;
    let mut info: PlatformInfo =
        serde_json::from_slice(&bytes).map_err(|e| Error::json(platform_json_path, e))?;
    let addr = info
        .versions
        .iter()
        .find(|v| v.version_id == version)
        .cloned()
        .ok_or_else(|| Error::NotFound {
            package: info.package_name.clone(),
            version: version.to_string(),
        })?;
    info.newest = addr;
    let bytes = serde_json::to_vec_pretty(&info).map_err(|e| Error::json(platform_json_path, e))?;
    write_file(platform_json_path, &bytes)
}

/// Walk `n` parents up from `path`. `None` if `path` runs out of ancestors
/// first (e.g. a `package.json` sitting directly under the build root).
fn nth_ancestor(path: &Path, n: usize) -> Option<PathBuf> {
    let mut cur = path;
    for _ in 0..n {
        cur = cur.parent()?;
    }
    Some(cur.to_path_buf())
}

/// `true` if `candidate` is `base` itself or a descendant of it. Mirrors the
/// original implementation's `isSubdirectory`/`filepath.Rel` check; guards
/// against a `package.json` sitting too shallow under the build root for its
/// computed platform/platforms directory to still land inside it.
fn is_subdirectory(base: &Path, candidate: &Path) -> bool {
    candidate.strip_prefix(base).is_ok()
}
