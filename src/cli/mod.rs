//! CLI surface (component H): one `Commands` enum exposing every lifecycle
//! and index-generator operation as a subcommand, with global flags mirroring
//! the `Config` store fields.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{Config, ConfigOverrides};
use crate::crypto;
use crate::indexgen::{self, IndexOptions};
use crate::log;
use crate::remote;
use crate::upgrader::{self, ActivationOutcome, Upgrader};
use crate::version::VersionNumber;

/// Cross-platform component package manager: signed download, cache, and
/// activation for workstation binaries.
#[derive(Debug, Parser)]
#[command(name = "pacm-get", version, about)]
pub struct PacmGetCli {
    #[command(flatten)]
    pub globals: GlobalArgs,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Parser)]
pub struct GlobalArgs {
    /// Origin base URL, e.g. https://packages.example.invalid/costrict
    #[arg(long, global = true)]
    pub base_url: Option<String>,
    /// Root of the local cache/install tree (defaults to ~/.costrict)
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,
    /// Where activated `exec` artifacts are installed
    #[arg(long, global = true)]
    pub install_dir: Option<PathBuf>,
    /// Where per-package descriptors and per-version artifacts are cached
    #[arg(long, global = true)]
    pub package_dir: Option<PathBuf>,
    /// PEM file containing the RSA public key used to verify signatures
    #[arg(long, global = true)]
    pub public: Option<PathBuf>,
    /// Target OS (defaults to the host OS)
    #[arg(long, global = true)]
    pub os: Option<String>,
    /// Target architecture (defaults to the host architecture)
    #[arg(long, global = true)]
    pub arch: Option<String>,
    /// Never mutate PATH/.bashrc/setx when activating an exec package
    #[arg(long, global = true, default_value_t = false)]
    pub no_set_path: bool,
    /// Install the activated artifact at this exact path instead of the
    /// computed default
    #[arg(long, global = true)]
    pub target_path: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve, download, and verify a package version (prints the descriptor)
    Get {
        package: String,
        #[arg(long)]
        version: Option<String>,
    },
    /// Activate a cached version (defaults to the active descriptor's version)
    Activate {
        package: String,
        #[arg(long)]
        version: Option<String>,
    },
    /// Get + activate in one step
    Upgrade {
        package: String,
        #[arg(long)]
        version: Option<String>,
    },
    /// Remove a cached version, or (with no --version) the active install
    Remove {
        package: String,
        #[arg(long)]
        version: Option<String>,
    },
    /// Run the retention sweep for one package, or every package in the cache
    Cleanup { package: Option<String> },
    /// List cached versions, or (with --remote) versions published at the origin
    List {
        package: Option<String>,
        #[arg(long, default_value_t = false)]
        remote: bool,
    },
    /// Walk a build directory and emit platform.json/platforms.json (and,
    /// optionally, packages.json/packages-overview.json) for its packages
    Index {
        build_dir: PathBuf,
        #[arg(long, default_value_t = false)]
        packages: bool,
        #[arg(long, default_value_t = false)]
        overview: bool,
    },
    /// Point an existing platform.json's `newest` at an already-published version
    Newest {
        platform_json: PathBuf,
        #[arg(long)]
        version: String,
    },
    /// Generate an RSA keypair and save it as PEM files
    Genkey {
        #[arg(long, default_value = "public.pem")]
        public: PathBuf,
        #[arg(long, default_value = "private.pem")]
        private: PathBuf,
    },
    /// Sign a file's MD5 digest with a private key, printing the hex signature
    Sign {
        #[arg(long)]
        key: PathBuf,
        #[arg(long)]
        target: PathBuf,
    },
}

impl PacmGetCli {
    fn config(&self) -> Result<Config> {
        let overrides = ConfigOverrides {
            base_url: self.globals.base_url.clone(),
            base_dir: self.globals.base_dir.clone(),
            install_dir: self.globals.install_dir.clone(),
            package_dir: self.globals.package_dir.clone(),
            public_key_file: self.globals.public.clone(),
            os: self.globals.os.clone(),
            arch: self.globals.arch.clone(),
            no_set_path: self.globals.no_set_path,
            target_path: self.globals.target_path.clone(),
        };
        Ok(Config::resolve(overrides)?)
    }

    pub fn run(self) -> Result<()> {
        match &self.command {
            Commands::Get { package, version } => self.run_get(package, version.as_deref()),
            Commands::Activate { package, version } => self.run_activate(package, version.as_deref()),
            Commands::Upgrade { package, version } => self.run_upgrade(package, version.as_deref()),
            Commands::Remove { package, version } => self.run_remove(package, version.as_deref()),
            Commands::Cleanup { package } => self.run_cleanup(package.as_deref()),
            Commands::List { package, remote } => self.run_list(package.as_deref(), *remote),
            Commands::Index { build_dir, packages, overview } => self.run_index(build_dir, *packages, *overview),
            Commands::Newest { platform_json, version } => self.run_newest(platform_json, version),
            Commands::Genkey { public, private } => self.run_genkey(public, private),
            Commands::Sign { key, target } => self.run_sign(key, target),
        }
    }

    fn run_get(&self, package: &str, version: Option<&str>) -> Result<()> {
        let cfg = self.config()?;
        let spec = parse_version_arg(version)?;
        let upgrader = Upgrader::new(package, cfg);
        let (descriptor, staged) = upgrader.get_package(spec)?;
        log::info(&format!(
            "{} {} {}",
            descriptor.package_name,
            descriptor.version_id,
            if staged { "(staged)" } else { "(already active)" }
        ));
        println!("{}", serde_json::to_string_pretty(&descriptor).context("serializing descriptor")?);
        Ok(())
    }

    fn run_activate(&self, package: &str, version: Option<&str>) -> Result<()> {
        let cfg = self.config()?;
        let upgrader = Upgrader::new(package, cfg);
        let spec = parse_version_arg(version)?;
        let target_version = match spec {
            Some(v) => v,
            None => {
                let current = upgrader.get_local_version();
                if current.is_zero() {
                    anyhow::bail!("no active version recorded for '{package}' and no --version given");
                }
                current
            }
        };
        let (descriptor, _) = upgrader.get_package(Some(target_version))?;
        match upgrader.activate_package(&descriptor)? {
            ActivationOutcome::Activated => {
                log::info(&format!("activated {} {}", descriptor.package_name, descriptor.version_id));
                Ok(())
            }
            ActivationOutcome::SelfUpgradeHandoff => {
                log::info("self-upgrade handoff spawned; exiting");
                std::process::exit(0);
            }
        }
    }

    fn run_upgrade(&self, package: &str, version: Option<&str>) -> Result<()> {
        let cfg = self.config()?;
        let spec = parse_version_arg(version)?;
        let upgrader = Upgrader::new(package, cfg);
        let (descriptor, changed, outcome) = upgrader.upgrade_package(spec)?;
        if changed {
            log::info(&format!("upgraded {} to {}", descriptor.package_name, descriptor.version_id));
        } else {
            log::info(&format!("{} already at {}", descriptor.package_name, descriptor.version_id));
        }
        match outcome {
            ActivationOutcome::Activated => Ok(()),
            ActivationOutcome::SelfUpgradeHandoff => {
                log::info("self-upgrade handoff spawned; exiting");
                std::process::exit(0);
            }
        }
    }

    fn run_remove(&self, package: &str, version: Option<&str>) -> Result<()> {
        let cfg = self.config()?;
        let spec = parse_version_arg(version)?;
        Upgrader::new(package, cfg).remove_package(spec)?;
        log::info(&format!("removed {package}{}", version.map(|v| format!(" {v}")).unwrap_or_default()));
        Ok(())
    }

    fn run_cleanup(&self, package: Option<&str>) -> Result<()> {
        let cfg = self.config()?;
        match package {
            Some(name) => upgrader::cleanup_group(&cfg, name)?,
            None => upgrader::cleanup_all(&cfg)?,
        }
        log::info("retention sweep complete");
        Ok(())
    }

    fn run_list(&self, package: Option<&str>, remote_flag: bool) -> Result<()> {
        let cfg = self.config()?;
        if remote_flag {
            let name = package.context("--remote requires a package name")?;
            let platform = remote::get_platform(&cfg.base_url, name, &cfg.os, &cfg.arch)?;
            for addr in &platform.versions {
                let marker = if addr.version_id == platform.newest.version_id { " (newest)" } else { "" };
                println!("{}{}", addr.version_id, marker);
            }
            return Ok(());
        }

        let mut descriptors = crate::cache::list_version_descriptors(&cfg);
        if let Some(name) = package {
            descriptors.retain(|(n, _)| n == name);
        }
        descriptors.sort_by(|a, b| (a.0.as_str(), a.1).cmp(&(b.0.as_str(), b.1)));
        for (name, version) in descriptors {
            println!("{name} {version}");
        }
        Ok(())
    }

    fn run_index(&self, build_dir: &std::path::Path, packages: bool, overview: bool) -> Result<()> {
        let result = indexgen::generate(build_dir, IndexOptions { emit_packages: packages, emit_overview: overview })?;
        log::info(&format!(
            "wrote {} platform.json file(s), {} platforms.json file(s)",
            result.platform_dirs_written, result.platforms_written
        ));
        if !result.skipped.is_empty() {
            log::warn(&format!("skipped {} unsafe output path(s)", result.skipped.len()));
        }
        Ok(())
    }

    fn run_newest(&self, platform_json: &std::path::Path, version: &str) -> Result<()> {
        let version = VersionNumber::parse(version)?;
        indexgen::set_newest(platform_json, version)?;
        log::info(&format!("{} newest set to {version}", platform_json.display()));
        Ok(())
    }

    fn run_genkey(&self, public: &std::path::Path, private: &std::path::Path) -> Result<()> {
        let (public_pem, private_pem) = crypto::generate_keypair()?;
        std::fs::write(public, public_pem).with_context(|| format!("writing {}", public.display()))?;
        std::fs::write(private, private_pem).with_context(|| format!("writing {}", private.display()))?;
        log::info(&format!("wrote {} and {}", public.display(), private.display()));
        Ok(())
    }

    fn run_sign(&self, key: &std::path::Path, target: &std::path::Path) -> Result<()> {
        let private_pem =
            std::fs::read_to_string(key).with_context(|| format!("reading {}", key.display()))?;
        let (_, md5_hex) = crypto::file_digest(target)?;
        let signature = crypto::sign(&private_pem, md5_hex.as_bytes())?;
        println!("{}", hex::encode(signature));
        Ok(())
    }
}

fn parse_version_arg(version: Option<&str>) -> Result<Option<VersionNumber>> {
    match version {
        Some(v) => Ok(Some(VersionNumber::parse(v)?)),
        None => Ok(None),
    }
}
