use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::catalog;
use crate::codec::{DocumentCodec, Edit, Node, YamlCodec};
use crate::error::{LocError, Result};
use crate::extract::key;
use crate::extract::DEFAULT_TRANSLATABLE_FIELDS;
use crate::progress::{Completion, Progress};
use crate::walk::DocumentWalker;

/// Counters reported by a merge run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub files_modified: usize,
    /// Translations written into a document.
    pub applied: usize,
    /// Translations matched to a record but identical to the current value
    /// (or empty), so nothing was written.
    pub skipped: usize,
    /// Catalog entries that never matched any record.
    pub unused: usize,
}

/// Splices translated text back into source documents by derived key.
///
/// Only documents with at least one applied change are rewritten, and the
/// rewrite goes through the codec's span patcher, so every byte outside the
/// substituted field values is preserved.
pub struct Merger {
    source_root: PathBuf,
    output_root: PathBuf,
    fields: Vec<String>,
    codec: Box<dyn DocumentCodec>,
}

impl Merger {
    pub fn new(source_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            output_root: output_root.into(),
            fields: DEFAULT_TRANSLATABLE_FIELDS
                .iter()
                .map(|f| f.to_string())
                .collect(),
            codec: Box::new(YamlCodec),
        }
    }

    pub fn set_fields(&mut self, fields: Vec<String>) {
        if !fields.is_empty() {
            self.fields = fields;
        }
    }

    pub fn set_codec(&mut self, codec: Box<dyn DocumentCodec>) {
        self.codec = codec;
    }

    /// Merge a translation catalog into the tree under the source root,
    /// writing modified documents under the output root at the same relative
    /// path. A missing or malformed catalog aborts the merge before any
    /// document is touched.
    pub fn run(
        &self,
        catalog_path: &Path,
        progress: &dyn Progress,
    ) -> Result<Completion<MergeStats>> {
        let translations = catalog::load_translation_map(catalog_path)?;
        info!(
            "loaded {} translations from {}",
            translations.len(),
            catalog_path.display()
        );

        let walker = DocumentWalker::new(&self.source_root);
        let files = walker.files()?;
        let total = files.len();
        info!(
            "merging into {} files, writing to {}",
            total,
            self.output_root.display()
        );

        let mut stats = MergeStats::default();
        let mut used_keys: HashSet<String> = HashSet::new();

        for (i, file) in files.iter().enumerate() {
            if progress.is_cancelled() {
                return Ok(Completion::Cancelled);
            }
            let rel = walker.relative(file);
            progress.report(i + 1, total, &format!("merge: {}", rel));

            let text = match fs::read_to_string(file) {
                Ok(text) => text,
                Err(e) => {
                    warn!("cannot read {}: {}", rel, e);
                    continue;
                }
            };
            let docs = match self.codec.load(&text) {
                Ok(docs) => docs,
                Err(e) => {
                    warn!("{}", LocError::yaml_parse(&rel, e.to_string()));
                    continue;
                }
            };

            let mut edits: Vec<Edit> = Vec::new();
            let mut file_used: HashSet<String> = HashSet::new();
            let mut file_skipped = 0;
            for record in top_level_records(&docs) {
                self.collect_edits(
                    record,
                    &translations,
                    &mut file_used,
                    &mut edits,
                    &mut file_skipped,
                );
            }
            // Records cloned through an anchor/alias share source spans, so
            // the same substitution can be collected more than once.
            edits.sort_by(|a, b| b.target.mark.index.cmp(&a.target.mark.index));
            edits.dedup_by(|a, b| {
                a.target.mark.index == b.target.mark.index && a.replacement == b.replacement
            });

            if edits.is_empty() {
                used_keys.extend(file_used);
                stats.skipped += file_skipped;
                continue;
            }

            // One unpatchable scalar skips the whole file, like a parse
            // failure; the run continues with the next document and none of
            // this file's matches count as used.
            let patched = match self.codec.patch(&text, &edits) {
                Ok(patched) => patched,
                Err(e) => {
                    warn!("skipping {}: {}", rel, e);
                    continue;
                }
            };

            let out_path = self.output_root.join(&rel);
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&out_path, patched)?;
            used_keys.extend(file_used);
            stats.skipped += file_skipped;
            stats.files_modified += 1;
            stats.applied += edits.len();
        }

        stats.unused = translations.len() - used_keys.len();
        info!(
            "merge done: {} files modified, {} applied, {} skipped (identical), {} unused",
            stats.files_modified, stats.applied, stats.skipped, stats.unused
        );
        Ok(Completion::Finished(stats))
    }

    /// Collect the substitutions for one record into per-file accumulators;
    /// the caller commits them only once the file is known to be patchable.
    fn collect_edits(
        &self,
        record: &Node,
        translations: &std::collections::BTreeMap<String, String>,
        used_keys: &mut HashSet<String>,
        edits: &mut Vec<Edit>,
        skipped: &mut usize,
    ) {
        if !key::is_candidate(record) {
            return;
        }
        let Some(prefix) = key::key_prefix(record) else {
            return;
        };

        for field in &self.fields {
            if !record.has_field(field) {
                continue;
            }
            let derived = format!("{}.{}", prefix, field);
            let Some(translation) = translations.get(&derived) else {
                continue;
            };
            used_keys.insert(derived.clone());

            match record.scalar(field) {
                Some(scalar) if !translation.is_empty() && *translation != scalar.value => {
                    edits.push(Edit {
                        key: derived,
                        target: scalar.clone(),
                        replacement: translation.clone(),
                    });
                }
                // Identical value, empty translation, or a non-scalar field:
                // matched but nothing to write.
                _ => *skipped += 1,
            }
        }
    }
}

fn top_level_records(docs: &[Node]) -> Vec<&Node> {
    let mut records = Vec::new();
    for doc in docs {
        match doc {
            Node::Seq(items) => records.extend(items.iter()),
            node @ Node::Map(_) => records.push(node),
            _ => {}
        }
    }
    records
}
