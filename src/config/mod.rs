use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

pub const CONFIG_FILE_NAME: &str = "config.json";

/// Persistent settings, read from `config.json` next to the working
/// directory. Every field has a default, so a partial (or missing) file is
/// fine; unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Root of the prototype tree to scan.
    pub scan_dir: String,
    /// Catalog file to write (or directory, in folder-grouped mode).
    pub extract_output: String,
    /// Where the downloaded translation catalog lands.
    pub translation_file: String,
    /// Root for merged documents.
    pub merge_output: String,
    /// Remote project id; the CLI and environment can override it.
    pub project_id: Option<u64>,
    /// API token; prefer the environment over committing it here.
    pub token: Option<String>,
    /// Record fields to extract and merge.
    pub fields: Vec<String>,
    /// Drop values that look like localization key references.
    pub filter_symbolic: bool,
    /// Write one catalog per top-level folder instead of a single file.
    pub by_folder: bool,
    /// Skip files whose fingerprint is unchanged since the last run.
    pub incremental: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scan_dir: "Resources/Prototypes".to_string(),
            extract_output: "output/en.json".to_string(),
            translation_file: "output/zh.json".to_string(),
            merge_output: "merged".to_string(),
            project_id: None,
            token: None,
            fields: vec!["name".to_string(), "description".to_string()],
            filter_symbolic: true,
            by_folder: false,
            incremental: true,
        }
    }
}

impl AppConfig {
    /// Load settings, falling back to defaults when the file is missing.
    /// A malformed file is reported and replaced by defaults rather than
    /// aborting startup.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(config) => config,
                Err(e) => {
                    warn!("ignoring malformed {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
