pub mod ftl;
pub mod key;

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::cache::{self, ChangeCache, CACHE_FILE_NAME};
use crate::catalog::{Catalog, CatalogEntry, STAGE_PRE_TRANSLATED};
use crate::codec::{DocumentCodec, Node, YamlCodec};
use crate::error::{LocError, Result};
use crate::progress::{Completion, Progress};
use crate::walk::DocumentWalker;

/// Fields offered for translation when none are configured.
pub const DEFAULT_TRANSLATABLE_FIELDS: [&str; 2] = ["name", "description"];

/// Counters reported by an extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub files_scanned: usize,
    pub files_with_text: usize,
    /// Files skipped by the change cache in incremental mode.
    pub files_skipped: usize,
    /// Values excluded by the symbolic-key filter.
    pub symbolic_skipped: usize,
    /// Entries whose original already is target-script text.
    pub pre_translated: usize,
    pub total_strings: usize,
    /// Folder-grouped mode only: number of catalogs written.
    pub group_count: usize,
    pub by_field: BTreeMap<String, usize>,
}

/// Scans a prototype tree and produces a translation catalog.
pub struct Extractor {
    root: PathBuf,
    fields: Vec<String>,
    incremental: bool,
    filter_symbolic: bool,
    codec: Box<dyn DocumentCodec>,
}

impl Extractor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            fields: DEFAULT_TRANSLATABLE_FIELDS
                .iter()
                .map(|f| f.to_string())
                .collect(),
            incremental: false,
            filter_symbolic: true,
            codec: Box::new(YamlCodec),
        }
    }

    /// Override the translatable field list.
    pub fn set_fields(&mut self, fields: Vec<String>) {
        if !fields.is_empty() {
            self.fields = fields;
        }
    }

    /// Skip files whose content fingerprint matches the previous run.
    pub fn set_incremental(&mut self, incremental: bool) {
        self.incremental = incremental;
    }

    /// Exclude values the symbolic-key heuristic classifies as references.
    pub fn set_filter_symbolic(&mut self, filter: bool) {
        self.filter_symbolic = filter;
    }

    /// Swap the document codec (tests use an in-memory fake).
    pub fn set_codec(&mut self, codec: Box<dyn DocumentCodec>) {
        self.codec = codec;
    }

    /// Extract the whole tree into one catalog file.
    ///
    /// In incremental mode the change cache next to `output` decides which
    /// files to re-parse; entries from skipped files are carried forward from
    /// the previous catalog, keyed by the source path recorded in their
    /// context. The catalog and the refreshed cache are written in one batch
    /// at the end.
    pub fn run(&self, output: &Path, progress: &dyn Progress) -> Result<Completion<ExtractStats>> {
        let walker = DocumentWalker::new(&self.root);
        let files = walker.files()?;
        let total = files.len();
        info!(
            "scanning {} ({} files{})",
            self.root.display(),
            total,
            if self.incremental {
                ", incremental"
            } else {
                ""
            }
        );

        let cache_path = cache_path_for(output);
        let old_cache = if self.incremental {
            ChangeCache::load(&cache_path)
        } else {
            ChangeCache::default()
        };
        let previous: Vec<CatalogEntry> = if self.incremental && output.exists() {
            Catalog::load(output)
                .map(|c| c.entries)
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        let mut stats = self.fresh_stats();
        let mut new_cache = ChangeCache::default();
        let mut entries: Vec<CatalogEntry> = Vec::new();

        for (i, file) in files.iter().enumerate() {
            if progress.is_cancelled() {
                return Ok(Completion::Cancelled);
            }
            let rel = walker.relative(file);
            stats.files_scanned += 1;
            progress.report(i + 1, total, &format!("scan: {}", rel));

            if self.incremental {
                match cache::fingerprint(file) {
                    Ok(fingerprint) => {
                        let unchanged = old_cache.is_unchanged(&rel, &fingerprint);
                        new_cache.record(rel.clone(), fingerprint);
                        if unchanged {
                            stats.files_skipped += 1;
                            continue;
                        }
                    }
                    Err(e) => {
                        // The file still exists, so it must not look vanished
                        // to the carry-forward pass: keep its old fingerprint
                        // and still attempt the scan below.
                        warn!("cannot fingerprint {}: {}", rel, e);
                        if let Some(old) = old_cache.fingerprint_of(&rel) {
                            new_cache.record(rel.clone(), old.to_string());
                        }
                    }
                }
            }

            let found = self.scan_file(file, &rel, &mut stats);
            if !found.is_empty() {
                stats.files_with_text += 1;
                entries.extend(found);
            }
        }

        if self.incremental && !previous.is_empty() {
            let fresh_keys: HashSet<String> =
                entries.iter().map(|e| e.key.clone()).collect();
            let carried_before = entries.len();
            for entry in previous {
                // Keys re-derived this run take precedence; entries whose
                // recorded file vanished from the tree are dropped.
                if fresh_keys.contains(&entry.key) {
                    continue;
                }
                let still_present = entry
                    .source_file()
                    .map(|f| new_cache.contains(f))
                    .unwrap_or(false);
                if still_present {
                    entries.push(entry);
                }
            }
            info!(
                "carried {} entries forward from the previous catalog",
                entries.len() - carried_before
            );
        }

        stats.total_strings = entries.len();
        Catalog::new(entries).save(output)?;
        if self.incremental {
            new_cache.save(&cache_path)?;
        }

        info!(
            "extraction done: {} files scanned, {} skipped, {} with text, {} strings ({} symbolic filtered, {} pre-translated)",
            stats.files_scanned,
            stats.files_skipped,
            stats.files_with_text,
            stats.total_strings,
            stats.symbolic_skipped,
            stats.pre_translated
        );
        Ok(Completion::Finished(stats))
    }

    /// Extract one catalog per source folder, mirroring the directory
    /// structure under `output_dir`. Files directly under the root go into
    /// the reserved `root` group.
    pub fn run_by_folder(
        &self,
        output_dir: &Path,
        progress: &dyn Progress,
    ) -> Result<Completion<ExtractStats>> {
        let walker = DocumentWalker::new(&self.root);
        let files = walker.files()?;
        let total = files.len();
        info!(
            "scanning {} by folder ({} files)",
            self.root.display(),
            total
        );

        let mut stats = self.fresh_stats();
        let mut groups: BTreeMap<String, Vec<CatalogEntry>> = BTreeMap::new();

        for (i, file) in files.iter().enumerate() {
            if progress.is_cancelled() {
                return Ok(Completion::Cancelled);
            }
            let rel = walker.relative(file);
            stats.files_scanned += 1;
            progress.report(i + 1, total, &format!("scan: {}", rel));

            let found = self.scan_file(file, &rel, &mut stats);
            if found.is_empty() {
                continue;
            }
            stats.files_with_text += 1;
            groups.entry(group_for(&rel)).or_default().extend(found);
        }

        fs::create_dir_all(output_dir)?;
        for (group, entries) in groups {
            if entries.is_empty() {
                continue;
            }
            let out_path = output_dir.join(format!("{}.json", group));
            stats.total_strings += entries.len();
            stats.group_count += 1;
            info!("  {}.json: {} entries", group, entries.len());
            Catalog::new(entries).save(&out_path)?;
        }

        info!(
            "extraction done: {} files scanned, {} catalogs, {} strings ({} symbolic filtered)",
            stats.files_scanned, stats.group_count, stats.total_strings, stats.symbolic_skipped
        );
        Ok(Completion::Finished(stats))
    }

    fn fresh_stats(&self) -> ExtractStats {
        let mut stats = ExtractStats::default();
        for field in &self.fields {
            stats.by_field.insert(field.clone(), 0);
        }
        stats
    }

    /// Parse one document and collect its entries. Parse failures are logged
    /// per file and yield nothing; empty documents yield nothing silently.
    fn scan_file(&self, file: &Path, rel_path: &str, stats: &mut ExtractStats) -> Vec<CatalogEntry> {
        let text = match fs::read_to_string(file) {
            Ok(text) => text,
            Err(e) => {
                warn!("cannot read {}: {}", rel_path, e);
                return Vec::new();
            }
        };
        let docs = match self.codec.load(&text) {
            Ok(docs) => docs,
            Err(e) => {
                warn!("{}", LocError::yaml_parse(rel_path, e.to_string()));
                return Vec::new();
            }
        };

        let mut entries = Vec::new();
        for doc in &docs {
            match doc {
                Node::Seq(items) => {
                    for item in items {
                        self.scan_record(item, rel_path, stats, &mut entries);
                    }
                }
                node @ Node::Map(_) => self.scan_record(node, rel_path, stats, &mut entries),
                _ => {}
            }
        }
        entries
    }

    fn scan_record(
        &self,
        record: &Node,
        rel_path: &str,
        stats: &mut ExtractStats,
        entries: &mut Vec<CatalogEntry>,
    ) {
        if !key::is_candidate(record) {
            return;
        }
        // The prefix rule is the final authority: candidates without a usable
        // id or parent produce nothing at all.
        let Some(prefix) = key::key_prefix(record) else {
            return;
        };

        for field in &self.fields {
            let Some(value) = record.str_field(field) else {
                continue;
            };
            if value.trim().is_empty() {
                continue;
            }
            if self.filter_symbolic && ftl::is_symbolic_key(value) {
                stats.symbolic_skipped += 1;
                continue;
            }

            let id = record.str_field("id").filter(|s| !s.is_empty());
            let parent = parent_display(record);
            let mut entry = CatalogEntry {
                key: format!("{}.{}", prefix, field),
                original: value.to_string(),
                context: CatalogEntry::context_text(rel_path, id, parent.as_deref()),
                translation: None,
                stage: None,
            };
            if contains_cjk(value) {
                entry.translation = Some(value.to_string());
                entry.stage = Some(STAGE_PRE_TRANSLATED);
                stats.pre_translated += 1;
            }
            entries.push(entry);
            *stats.by_field.entry(field.clone()).or_insert(0) += 1;
        }
    }
}

/// Directory group for a relative file path; files at the root map to the
/// reserved `root` group.
fn group_for(rel_path: &str) -> String {
    match rel_path.rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => dir.to_string(),
        _ => "root".to_string(),
    }
}

fn cache_path_for(output: &Path) -> PathBuf {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(CACHE_FILE_NAME),
        _ => PathBuf::from(CACHE_FILE_NAME),
    }
}

/// Provenance-only rendering of the parent reference for the context text.
fn parent_display(record: &Node) -> Option<String> {
    match record.get("parent")? {
        Node::Scalar(s) if !s.value.is_empty() => Some(s.value.clone()),
        Node::Seq(items) => {
            let names: Vec<&str> = items
                .iter()
                .filter_map(|n| match n {
                    Node::Scalar(s) => Some(s.value.as_str()),
                    _ => None,
                })
                .collect();
            if names.is_empty() {
                None
            } else {
                Some(names.join(", "))
            }
        }
        _ => None,
    }
}

/// Target-script heuristic: the original already contains CJK ideographs.
fn contains_cjk(text: &str) -> bool {
    text.chars()
        .any(|c| ('\u{4E00}'..='\u{9FFF}').contains(&c))
}
