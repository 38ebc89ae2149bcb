//! PATH maintenance for `exec` packages, mediated through a single
//! `PathInstaller` so every mutation of process/shell state goes through one
//! no-op-able seam (design note: global mutable state is restricted to the
//! process `PATH` and `~/.bashrc`/the Windows persistent `PATH`).

use std::env;
use std::fs;
use std::io::Write;
use std::path::Path;
#[cfg(windows)]
use std::process::Command;

use crate::error::{Error, Result};

pub struct PathInstaller {
    pub no_set_path: bool,
}

impl PathInstaller {
    pub fn new(no_set_path: bool) -> Self {
        Self { no_set_path }
    }

    /// Ensure `install_dir` is reachable from new shells. A no-op if
    /// `no_set_path` is set, or if `install_dir` already appears in `PATH`
    /// (the dedup test is plain substring containment, crude but sufficient
    /// per the reference behavior this mirrors).
    pub fn ensure_on_path(&self, install_dir: &Path) -> Result<()> {
        if self.no_set_path {
            return Ok(());
        }
        let install_dir_str = install_dir.to_string_lossy().to_string();
        let current_path = env::var("PATH").unwrap_or_default();
        if current_path.contains(install_dir_str.as_str()) {
            return Ok(());
        }

        if cfg!(windows) {
            self.persist_windows(&current_path, &install_dir_str)
        } else {
            self.persist_posix(&current_path, &install_dir_str)
        }
    }

    #[cfg(windows)]
    fn persist_windows(&self, current_path: &str, install_dir: &str) -> Result<()> {
        let new_path = format!("{current_path};{install_dir}");
        Command::new("setx")
            .args(["PATH", &new_path])
            .output()
            .map_err(|e| Error::io("setx", e))?;
        env::set_var("PATH", &new_path);
        Ok(())
    }

    #[cfg(not(windows))]
    fn persist_windows(&self, _current_path: &str, _install_dir: &str) -> Result<()> {
        unreachable!("persist_windows is only called on windows")
    }

    fn persist_posix(&self, current_path: &str, install_dir: &str) -> Result<()> {
        let new_path = format!("{current_path}:{install_dir}");
        env::set_var("PATH", &new_path);

        let bashrc = dirs::home_dir().unwrap_or_else(|| Path::new(".").to_path_buf()).join(".bashrc");
        let line = format!("export PATH=$PATH:{install_dir}");
        let existing = fs::read_to_string(&bashrc).unwrap_or_default();
        if existing.lines().any(|l| l.trim() == line) {
            return Ok(());
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&bashrc)
            .map_err(|e| Error::io(&bashrc, e))?;
        writeln!(file, "{line}").map_err(|e| Error::io(&bashrc, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::lock_env;

    #[test]
    fn no_set_path_is_a_pure_no_op() {
        let _lock = lock_env();
        let installer = PathInstaller::new(true);
        installer.ensure_on_path(Path::new("/opt/never-touched")).unwrap();
    }

    #[test]
    fn already_on_path_is_a_no_op() {
        let _lock = lock_env();
        let prev = env::var_os("PATH");
        env::set_var("PATH", "/usr/bin:/opt/costrict/bin:/bin");
        let installer = PathInstaller::new(false);
        installer.ensure_on_path(Path::new("/opt/costrict/bin")).unwrap();
        assert_eq!(env::var("PATH").unwrap(), "/usr/bin:/opt/costrict/bin:/bin");
        if let Some(p) = prev {
            env::set_var("PATH", p);
        }
    }
}
