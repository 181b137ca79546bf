//! Tracing setup
//!
//! While the TUI owns the terminal, log lines go to a file in the cache
//! directory; one-shot subcommands log to stderr. The filter is read from
//! `MARKWATCH_LOG` and defaults to `warn`.

use directories::ProjectDirs;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive
pub const LOG_ENV: &str = "MARKWATCH_LOG";

static INIT: OnceLock<()> = OnceLock::new();

/// Where log output is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// Default log file (`~/.cache/markwatch/markwatch.log` on Linux)
pub fn default_log_path() -> Option<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "markwatch")?;
    Some(project_dirs.cache_dir().join("markwatch.log"))
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Installs the global subscriber; later calls are no-ops
///
/// Falls back to stderr when the log file cannot be opened.
pub fn init(target: LogTarget) {
    INIT.get_or_init(|| {
        let builder = tracing_subscriber::fmt().with_env_filter(env_filter());

        if let LogTarget::File(path) = &target {
            if let Some(parent) = path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            match OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => {
                    let _ = builder
                        .with_ansi(false)
                        .with_writer(Mutex::new(file))
                        .try_init();
                    return;
                }
                Err(e) => eprintln!("markwatch: cannot open log file {}: {}", path.display(), e),
            }
        }

        let _ = builder.with_writer(std::io::stderr).try_init();
    });
}
