use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LocError, Result};

/// Marker prefix of the first context line; incremental extraction recovers
/// the source file of a carried-forward entry by parsing it back out.
const FILE_MARKER: &str = "file: ";

/// Stage value for entries whose original text already is target-script.
pub const STAGE_PRE_TRANSLATED: u32 = 1;

/// One extracted (or translated) string exchanged with the translation
/// service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stable derived key, e.g. `chair_1.name`.
    pub key: String,
    /// Original text as found in the source document.
    pub original: String,
    /// Free-form provenance shown to translators. The first line encodes the
    /// relative source path (`file: <path>`); nothing else is machine-parsed.
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<u32>,
}

impl CatalogEntry {
    /// Build the provenance text for an entry.
    pub fn context_text(rel_path: &str, id: Option<&str>, parent: Option<&str>) -> String {
        let mut context = format!("{}{}\n", FILE_MARKER, rel_path);
        if let Some(id) = id {
            context.push_str(&format!("id: {}\n", id));
        }
        if let Some(parent) = parent {
            context.push_str(&format!("parent: {}\n", parent));
        }
        context
    }

    /// Recover the relative source path from the context's first line.
    pub fn source_file(&self) -> Option<&str> {
        let first = self.context.lines().next()?;
        first.strip_prefix(FILE_MARKER).map(str::trim)
    }
}

/// A flat collection of catalog entries, saved and loaded as a JSON array
/// (UTF-8, non-ASCII left unescaped).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a catalog (array form). Missing file is a typed error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LocError::CatalogMissing {
                path: path.to_path_buf(),
            });
        }
        let text = fs::read_to_string(path)?;
        let entries: Vec<CatalogEntry> =
            serde_json::from_str(&text).map_err(|e| LocError::CatalogFormat {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(Self { entries })
    }

    /// Write the catalog in one batch, pretty-printed with unescaped UTF-8.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Merge input: either the catalog array form or a flat key→translation map.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TranslationSource {
    Entries(Vec<CatalogEntry>),
    Map(BTreeMap<String, String>),
}

/// Load a key→translation map from a catalog file, accepting both shapes.
/// Entries without a translation are dropped.
pub fn load_translation_map(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Err(LocError::CatalogMissing {
            path: path.to_path_buf(),
        });
    }
    let text = fs::read_to_string(path)?;
    let source: TranslationSource =
        serde_json::from_str(&text).map_err(|e| LocError::CatalogFormat {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    let map = match source {
        TranslationSource::Map(map) => map,
        TranslationSource::Entries(entries) => entries
            .into_iter()
            .filter_map(|e| {
                let translation = e.translation?;
                if translation.is_empty() {
                    None
                } else {
                    Some((e.key, translation))
                }
            })
            .collect(),
    };
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(key: &str, translation: Option<&str>) -> CatalogEntry {
        CatalogEntry {
            key: key.to_string(),
            original: "original".to_string(),
            context: CatalogEntry::context_text("Entities/chairs.yml", Some("chair_1"), None),
            translation: translation.map(str::to_string),
            stage: None,
        }
    }

    #[test]
    fn test_source_file_round_trip() {
        let e = entry("chair_1.name", None);
        assert_eq!(e.source_file(), Some("Entities/chairs.yml"));
    }

    #[test]
    fn test_save_load_round_trip_keeps_utf8() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("en.json");
        let catalog = Catalog::new(vec![CatalogEntry {
            key: "chair_1.name".to_string(),
            original: "A plain chair".to_string(),
            context: "file: a.yml\n".to_string(),
            translation: Some("一张普通的椅子".to_string()),
            stage: Some(STAGE_PRE_TRANSLATED),
        }]);
        catalog.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("一张普通的椅子"), "non-ASCII must stay unescaped");

        let loaded = Catalog::load(&path).unwrap();
        assert_eq!(loaded, catalog);
    }

    #[test]
    fn test_missing_catalog_is_typed_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("zh.json");
        assert!(matches!(
            Catalog::load(&missing),
            Err(LocError::CatalogMissing { .. })
        ));
        assert!(matches!(
            load_translation_map(&missing),
            Err(LocError::CatalogMissing { .. })
        ));
    }

    #[test]
    fn test_translation_map_from_array_form() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("zh.json");
        Catalog::new(vec![
            entry("a.name", Some("甲")),
            entry("b.name", None),
            entry("c.name", Some("")),
        ])
        .save(&path)
        .unwrap();

        let map = load_translation_map(&path).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a.name").map(String::as_str), Some("甲"));
    }

    #[test]
    fn test_translation_map_from_flat_object_form() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("zh.json");
        std::fs::write(&path, r#"{"chair_1.name": "一张普通的椅子"}"#).unwrap();

        let map = load_translation_map(&path).unwrap();
        assert_eq!(
            map.get("chair_1.name").map(String::as_str),
            Some("一张普通的椅子")
        );
    }

    #[test]
    fn test_malformed_catalog_is_format_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("zh.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            load_translation_map(&path),
            Err(LocError::CatalogFormat { .. })
        ));
    }
}
