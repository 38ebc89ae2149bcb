//! ANSI color codes for status output. Kept as bare escape-sequence
//! constants rather than a terminal crate — the only ambient styling this
//! binary does is three status prefixes, never cursor control or layout.

pub const RESET: &str = "\x1b[0m";
pub const RED: &str = "\x1b[31m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

/// Whether to emit the escape codes at all: disabled under `NO_COLOR`
/// (https://no-color.org) or when stderr isn't a terminal.
pub fn enabled() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    is_tty()
}

fn is_tty() -> bool {
    use std::io::IsTerminal;
    std::io::stderr().is_terminal()
}

pub fn paint(code: &str, text: &str) -> String {
    if enabled() {
        format!("{code}{text}{RESET}")
    } else {
        text.to_string()
    }
}
