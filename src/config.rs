//! Runtime settings for the store and option binders.
//!
//! Priority: `STRATA_DEBOUNCE_MS` env var -> settings file -> defaults.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default quiet period before a secondary (debounced) commit fires
pub const DEFAULT_DEBOUNCE_MS: u64 = 1500;

/// Env var overriding `Settings::debounce_ms`
pub const DEBOUNCE_ENV: &str = "STRATA_DEBOUNCE_MS";

/// Which survivor becomes current when the current layer is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReselectPolicy {
    /// Layer that held the next-lower order; the next-higher one if the
    /// deleted layer was first.
    #[default]
    PreferPrevious,
    /// Layer that held the next-higher order; the next-lower one if the
    /// deleted layer was last.
    PreferNext,
}

impl ReselectPolicy {
    /// Index (into the survivors) of the new current layer after removing
    /// `removed` from a list that now holds `remaining` layers.
    pub fn pick(self, removed: usize, remaining: usize) -> usize {
        debug_assert!(remaining > 0, "reselect on empty layer list");
        match self {
            ReselectPolicy::PreferPrevious => removed.saturating_sub(1),
            ReselectPolicy::PreferNext => removed.min(remaining - 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub reselect: ReselectPolicy,
    pub debounce_ms: u64,
    /// Copies land right after their source; otherwise at the end.
    pub insert_copies_after_source: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reselect: ReselectPolicy::default(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            insert_copies_after_source: true,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file. A missing file yields defaults.
    /// The env override is applied either way.
    pub fn load(path: &Path) -> Result<Self> {
        let mut settings = if path.exists() {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings: {}", path.display()))?;
            serde_json::from_str(&json)
                .with_context(|| format!("Failed to parse settings: {}", path.display()))?
        } else {
            log::debug!("Settings file {} not found, using defaults", path.display());
            Settings::default()
        };
        settings.apply_env();
        Ok(settings)
    }

    /// Apply `STRATA_DEBOUNCE_MS` if set and valid.
    pub fn apply_env(&mut self) {
        if let Ok(raw) = std::env::var(DEBOUNCE_ENV) {
            self.apply_debounce_override(&raw);
        }
    }

    fn apply_debounce_override(&mut self, raw: &str) {
        match raw.trim().parse::<u64>() {
            Ok(ms) => self.debounce_ms = ms,
            Err(_) => log::warn!("Ignoring invalid {}={:?}", DEBOUNCE_ENV, raw),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings: {}", path.display()))
    }
}
