//! Declarative runtime settings.
//!
//! Settings are split per category; each category has a serde patch struct
//! so a partial JSON document merges over the defaults and unknown keys are
//! tolerated. The library has no initialization entry point, so the file is
//! read once, lazily: `$CLANG_COMPLETE_CONFIG` if set, otherwise
//! `~/.clang-complete/config.json`.

use std::collections::HashMap;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settings {
    pub completion: CompletionSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn from_json(payload: &Value) -> Self {
        let mut settings = Self::default();
        if let Ok(patch) = serde_json::from_value::<SettingsPatch>(payload.clone()) {
            settings.apply_patch(patch);
        }
        settings
    }

    fn apply_patch(
        &mut self,
        patch: SettingsPatch,
    ) {
        if let Some(p) = patch.completion {
            self.completion.apply_patch(p);
        }
        if let Some(p) = patch.logging {
            self.logging.apply_patch(p);
        }
    }

    fn load() -> Self {
        let Some(path) = config_path() else {
            return Self::default();
        };
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        match serde_json::from_str::<Value>(&contents) {
            Ok(payload) => {
                debug!("[config] loaded {}", path.display());
                Self::from_json(&payload)
            }
            Err(err) => {
                debug!("[config] ignoring malformed {}: {err}", path.display());
                Self::default()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSettings {
    /// Reparse the unit when a completion request shapes to nothing, so the
    /// next attempt sees a refreshed preamble. Historical behavior; off by
    /// default.
    pub reparse_on_empty: bool,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            reparse_on_empty: false,
        }
    }
}

impl CompletionSettings {
    fn apply_patch(
        &mut self,
        patch: CompletionSettingsPatch,
    ) {
        if let Some(v) = patch.reparse_on_empty {
            self.reparse_on_empty = v;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// An `EnvFilter` directive scoped to this crate.
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "clang_complete=error",
            LogLevel::Warn => "clang_complete=warn",
            LogLevel::Info => "clang_complete=info",
            LogLevel::Debug => "clang_complete=debug",
            LogLevel::Trace => "clang_complete=trace",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoggingSettings {
    pub level: LogLevel,
}

impl LoggingSettings {
    fn apply_patch(
        &mut self,
        patch: LoggingSettingsPatch,
    ) {
        if let Some(v) = patch.level {
            self.level = v;
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct SettingsPatch {
    completion: Option<CompletionSettingsPatch>,
    logging: Option<LoggingSettingsPatch>,
    #[serde(flatten)]
    _extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct CompletionSettingsPatch {
    reparse_on_empty: Option<bool>,
    #[serde(flatten)]
    _extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct LoggingSettingsPatch {
    level: Option<LogLevel>,
    #[serde(flatten)]
    _extra: HashMap<String, Value>,
}

fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("CLANG_COMPLETE_CONFIG") {
        return Some(PathBuf::from(path));
    }
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".clang-complete").join("config.json"))
}

static SETTINGS: Lazy<Settings> = Lazy::new(Settings::load);

/// Process-wide settings, loaded on first access.
pub fn settings() -> &'static Settings {
    &SETTINGS
}
