//! Build metadata surfaced through the `Name`/`Version`/`Environment` family
//! of builtins and the REPL banner.

use std::time::{SystemTime, UNIX_EPOCH};

pub const NAME: &str = "Ember Programming Language";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHOR_NAME: &str = "Ember Authors";
pub const AUTHOR_EMAIL: &str = "ember@example.org";
pub const FILE_EXTENSION: &str = ".ebr";
pub const REPL_SIGNAL: &str = "ember> ";

pub fn name_version() -> String {
    format!("{} {}", NAME, VERSION)
}

pub fn name_version_environment() -> String {
    format!("{} {}", name_version(), environment())
}

/// OS/arch, logical CPU count and a unix timestamp.
pub fn environment() -> String {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!(
        "{}/{} {}-CPU(s) {}",
        std::env::consts::OS.to_uppercase(),
        std::env::consts::ARCH.to_uppercase(),
        cpus,
        now
    )
}

pub fn copyright() -> String {
    String::from("Copyright \u{a9} Ember Authors. All Rights Reserved.")
}
