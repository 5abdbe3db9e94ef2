//! A small timestamped, colored status logger: lines written to stderr,
//! gated by a single `--quiet` flag set once at startup.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;
use colored::Colorize;

static QUIET: AtomicBool = AtomicBool::new(false);

pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

fn timestamp() -> String {
    Local::now().format("%H:%M:%S%.3f").to_string()
}

pub fn info(msg: &str) {
    if QUIET.load(Ordering::Relaxed) {
        return;
    }
    eprintln!("{} {}", timestamp().dimmed(), msg);
}

pub fn warn(msg: &str) {
    if QUIET.load(Ordering::Relaxed) {
        return;
    }
    eprintln!("{} {} {}", timestamp().dimmed(), "warn:".yellow().bold(), msg);
}

pub fn error(msg: &str) {
    // errors are surfaced even in quiet mode; quiet only suppresses progress chatter
    eprintln!("{} {} {}", timestamp().dimmed(), "error:".red().bold(), msg);
}
