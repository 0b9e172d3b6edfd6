use crate::errors::{NotesError, NotesResult};
use crate::models::{Priority, UNKNOWN_AUTHOR};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SIDECAR_FILE: &str = ".notes.json";
pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub sidecar_file: String,
    pub save_debounce_ms: u64,
    /// Priority given to notes created through the comment surface.
    pub new_note_priority: Priority,
    pub author: Option<String>,
    pub watch_sidecar: bool,
    pub log_filter: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sidecar_file: DEFAULT_SIDECAR_FILE.to_string(),
            save_debounce_ms: DEFAULT_SAVE_DEBOUNCE_MS,
            new_note_priority: Priority::Low,
            author: None,
            watch_sidecar: true,
            log_filter: "info".to_string(),
            log_dir: None,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> NotesResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|error| NotesError::Io(format!("{}: {}", path.display(), error)))?;
        let settings: Settings = serde_json::from_str(&raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> NotesResult<()> {
        let name = self.sidecar_file.trim();
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(NotesError::InvalidInput(format!(
                "sidecarFile must be a plain file name, got '{}'",
                self.sidecar_file
            )));
        }
        Ok(())
    }

    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    pub fn resolve_author(&self) -> String {
        if let Some(author) = self.author.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
            return author.to_string();
        }
        ["USER", "USERNAME"]
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string())
    }
}
