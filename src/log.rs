//! Status logging: the Logger contract (`info`/`warn`/`error`) satisfied by
//! thin wrappers over `println!`/`eprintln!`, prefixed and color-coded the
//! way the reference tooling's own status lines are, without pulling in a
//! structured/tracing stack this binary has no other use for.

use crate::colors;

const PREFIX: &str = "[pacm-get]";

pub fn info(message: &str) {
    println!("{} {}", colors::paint(colors::CYAN, PREFIX), message);
}

pub fn warn(message: &str) {
    eprintln!("{} {}", colors::paint(colors::YELLOW, PREFIX), message);
}

pub fn error(message: &str) {
    eprintln!("{} {}", colors::paint(colors::RED, PREFIX), message);
}
