//! Self-upgrade handoff: when the package being upgraded is this binary
//! itself, the running process cannot overwrite its own on-disk image on
//! every platform, so activation delegates the final copy to a detached
//! shell command with a short delay and exits immediately afterward. The
//! delay gives the invoking shell time to regain control before the binary
//! underneath it is replaced; this is a single-machine, single-user
//! convention, not a safe protocol against concurrent invocations.

use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::{Error, Result};

const HANDOFF_DELAY_SECS: u32 = 3;

/// The name this binary is upgraded under when an invocation targets itself.
/// `get_package`/`activate_package` compare the requested package name
/// against this constant (case-sensitive, matching the package-naming
/// convention used everywhere else in the descriptor format) to decide
/// whether the handoff path applies.
pub fn self_package_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}

#[cfg(unix)]
pub fn spawn_handoff(cached_artifact: &Path, installed_path: &Path) -> Result<()> {
    let command = format!(
        "nohup sh -c 'sleep {delay} && cp -f {cached} {installed}' > /dev/null 2>&1 &",
        delay = HANDOFF_DELAY_SECS,
        cached = shell_quote(cached_artifact),
        installed = shell_quote(installed_path),
    );
    Command::new("sh")
        .arg("-c")
        .arg(&command)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| Error::io(cached_artifact, e))?;
    Ok(())
}

#[cfg(windows)]
pub fn spawn_handoff(cached_artifact: &Path, installed_path: &Path) -> Result<()> {
    let inner = format!(
        "timeout /T {delay} /nobreak >NUL && copy /Y {cached} {installed}",
        delay = HANDOFF_DELAY_SECS,
        cached = cmd_quote(cached_artifact),
        installed = cmd_quote(installed_path),
    );
    let outer = format!("start /min cmd /C \"{inner}\"");
    Command::new("cmd")
        .args(["/C", &outer])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| Error::io(cached_artifact, e))?;
    Ok(())
}

#[cfg(unix)]
fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', "'\\''"))
}

#[cfg(windows)]
fn cmd_quote(path: &Path) -> String {
    format!("\"{}\"", path.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_package_name_matches_this_crate() {
        assert_eq!(self_package_name(), "pacm-get");
    }

    #[cfg(unix)]
    #[test]
    fn shell_quote_escapes_embedded_single_quotes() {
        let p = Path::new("/tmp/a'b");
        assert_eq!(shell_quote(p), "'/tmp/a'\\''b'");
    }
}
