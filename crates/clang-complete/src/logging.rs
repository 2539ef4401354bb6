//! One-shot tracing bootstrap.
//!
//! The crate is a library loaded into an editor process, so there is no
//! `main` to install a subscriber; the first ABI call does it instead.
//! Events go to a never-rolling log file under `~/.clang-complete/` (temp
//! dir fallback), filtered by `CLANG_COMPLETE_LOG` when set and by the
//! configured level otherwise.

use std::path::PathBuf;
use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config;

const LOG_FILE_NAME: &str = "clang-complete.log";
const FILTER_ENV: &str = "CLANG_COMPLETE_LOG";

pub(crate) fn init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(FILTER_ENV)
            .unwrap_or_else(|_| EnvFilter::new(config::settings().logging.level.directive()));

        let file_appender = tracing_appender::rolling::never(log_dir(), LOG_FILE_NAME);
        let file_layer = fmt::layer().with_writer(file_appender).with_ansi(false).with_target(false);

        // Another subscriber may already be installed when the host process
        // uses tracing itself; that is fine.
        let _ = tracing_subscriber::registry().with(filter).with(file_layer).try_init();
    });
}

fn log_dir() -> PathBuf {
    if let Some(home) = std::env::var_os("HOME") {
        let dir = PathBuf::from(home).join(".clang-complete");
        if std::fs::create_dir_all(&dir).is_ok() {
            return dir;
        }
    }
    std::env::temp_dir()
}
