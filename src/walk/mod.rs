use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{LocError, Result};

/// Extensions treated as structured prototype documents.
pub const DOCUMENT_EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// Walks a directory tree for prototype documents in a stable order.
///
/// Entries are visited depth-first with siblings sorted by file name, so two
/// runs over an unchanged tree always produce the same file sequence. This
/// keeps catalog output diffable between runs; key derivation itself does not
/// depend on the ordering.
pub struct DocumentWalker {
    root: PathBuf,
}

impl DocumentWalker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Collect all document paths under the root, sorted deterministically.
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(LocError::RootNotFound {
                path: self.root.clone(),
            });
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            if is_document(entry.path()) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    /// Path of `file` relative to the walk root, with forward slashes.
    pub fn relative(&self, file: &Path) -> String {
        let rel = file.strip_prefix(&self.root).unwrap_or(file);
        rel.to_string_lossy().replace('\\', "/")
    }
}

fn is_document(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            DOCUMENT_EXTENSIONS.iter().any(|d| ext == *d)
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collects_only_documents() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.yml"), "x: 1").unwrap();
        fs::write(temp.path().join("b.yaml"), "x: 1").unwrap();
        fs::write(temp.path().join("notes.txt"), "x").unwrap();

        let walker = DocumentWalker::new(temp.path());
        let files = walker.files().unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_order_is_deterministic_and_sorted() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("zebra.yml"), "x: 1").unwrap();
        fs::write(temp.path().join("alpha.yml"), "x: 1").unwrap();
        fs::write(temp.path().join("sub").join("mid.yml"), "x: 1").unwrap();

        let walker = DocumentWalker::new(temp.path());
        let first = walker.files().unwrap();
        let second = walker.files().unwrap();
        assert_eq!(first, second);

        let names: Vec<String> = first.iter().map(|p| walker.relative(p)).collect();
        assert_eq!(names, vec!["alpha.yml", "sub/mid.yml", "zebra.yml"]);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let walker = DocumentWalker::new("/nonexistent/protoloc-test");
        assert!(matches!(
            walker.files(),
            Err(LocError::RootNotFound { .. })
        ));
    }
}
