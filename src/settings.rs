//! User overrides for the system prompt and refusal prefixes.

use crate::error::ChatError;
use crate::guardrails::{GuardrailConfig, DEFAULT_REFUSAL_PREFIXES};
use crate::prompt::{PromptConfig, DEFAULT_SYSTEM_PROMPT};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Advanced settings. The overrides only apply while `enabled` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedSettings {
    pub enabled: bool,
    pub system_prompt: String,
    pub refusal_prefixes: Vec<String>,
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            refusal_prefixes: DEFAULT_REFUSAL_PREFIXES
                .iter()
                .map(|prefix| prefix.to_string())
                .collect(),
        }
    }
}

impl AdvancedSettings {
    /// Turn the overrides on, keeping the current values.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Turn the overrides off and restore the defaults.
    pub fn disable(&mut self) {
        *self = Self::default();
    }

    /// Replace the prefixes with one entry per non-blank line of `text`.
    pub fn set_refusal_prefixes_from_text(&mut self, text: &str) {
        self.refusal_prefixes = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();
    }

    /// The prefixes as newline-separated text, for editing.
    pub fn refusal_prefixes_text(&self) -> String {
        self.refusal_prefixes.join("\n")
    }

    pub fn prompt_config(&self) -> PromptConfig {
        if self.enabled {
            PromptConfig::new(self.system_prompt.clone())
        } else {
            PromptConfig::default()
        }
    }

    pub fn guardrail_config(&self) -> GuardrailConfig {
        if self.enabled {
            GuardrailConfig::new(self.refusal_prefixes.clone())
        } else {
            GuardrailConfig::default()
        }
    }
}

/// JSON file holding [`AdvancedSettings`].
///
/// Only enabled settings are stored; saving disabled settings removes the file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read stored settings. Missing, unreadable or disabled settings give `None`.
    pub fn load(&self) -> Option<AdvancedSettings> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "cannot read settings");
                return None;
            }
        };

        match serde_json::from_str::<AdvancedSettings>(&text) {
            Ok(settings) if settings.enabled => Some(settings),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring malformed settings");
                None
            }
        }
    }

    /// Stored settings, or the defaults.
    pub fn load_or_default(&self) -> AdvancedSettings {
        self.load().unwrap_or_default()
    }

    pub fn save(&self, settings: &AdvancedSettings) -> Result<(), ChatError> {
        if !settings.enabled {
            return self.remove();
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ChatError::SettingsError(e.to_string()))?;
        }

        let json = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, json).map_err(|e| ChatError::SettingsError(e.to_string()))
    }

    fn remove(&self) -> Result<(), ChatError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ChatError::SettingsError(e.to_string())),
        }
    }
}
