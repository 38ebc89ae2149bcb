//! Shared test scaffolding: an env-var sandbox so `Config::resolve` and the
//! cache-layout helpers resolve inside a throwaway temp directory instead of
//! the real user cache, plus a minimal local HTTP origin for integration
//! tests that exercise the Upgrader end-to-end.

use once_cell::sync::Lazy;
use std::env;
use std::ffi::OsString;
use std::sync::{Mutex, MutexGuard};

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub fn lock_env() -> MutexGuard<'static, ()> {
    ENV_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Guards environment variables so `Config::resolve`'s default `base_dir`
/// resolves inside a temporary sandbox, and restores the previous values on
/// drop.
pub struct DataHomeGuard {
    _lock: MutexGuard<'static, ()>,
    pub temp: tempfile::TempDir,
    prev_base_dir: Option<OsString>,
    prev_home: Option<OsString>,
}

impl DataHomeGuard {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let lock = lock_env();
        let temp = tempfile::tempdir().expect("create test tempdir");

        let prev_base_dir = env::var_os("PACM_GET_BASE_DIR");
        let base_dir = temp.path().join("costrict");
        env::set_var("PACM_GET_BASE_DIR", base_dir.as_os_str());

        let prev_home = env::var_os("HOME");
        env::set_var("HOME", temp.path());

        Self { _lock: lock, temp, prev_base_dir, prev_home }
    }

    pub fn base_dir(&self) -> std::path::PathBuf {
        self.temp.path().join("costrict")
    }
}

impl Drop for DataHomeGuard {
    fn drop(&mut self) {
        restore_env("PACM_GET_BASE_DIR", &self.prev_base_dir);
        restore_env("HOME", &self.prev_home);
    }
}

fn restore_env(key: &str, previous: &Option<OsString>) {
    match previous {
        Some(val) => env::set_var(key, val),
        None => env::remove_var(key),
    }
}
