//! Batch index builder: image directory in, persisted artifact pair out.

use crate::error::{Result, RetrievalError};
use crate::features::FeatureSource;
use crate::persistence::ArtifactPaths;
use crate::store::FeatureVectorStore;
use crate::vector::FeatureVector;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Image file extensions admitted by default (compared case-insensitively).
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff"];

#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Lowercase extensions, without the leading dot.
    pub allowed_extensions: Vec<String>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

/// An item that could not be indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub identifier: String,
    pub reason: String,
}

/// Outcome of a build run.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Files whose extension was on the allow-list.
    pub admitted: usize,
    /// Items that made it into the index.
    pub indexed: usize,
    /// Directory entries ignored because they are not image files.
    pub ignored: usize,
    /// Admitted items whose features could not be obtained.
    pub failed: Vec<SkippedItem>,
    pub dimension: usize,
}

/// Builds a feature vector store from a directory of images.
///
/// Identifier order follows directory iteration order, which is not stable
/// across filesystems; only `identifier[i]` ↔ `vector[i]` is guaranteed.
pub struct IndexBuilder<S> {
    source: S,
    config: BuilderConfig,
}

impl<S: FeatureSource> IndexBuilder<S> {
    pub fn new(source: S) -> Self {
        Self::with_config(source, BuilderConfig::default())
    }

    pub fn with_config(source: S, config: BuilderConfig) -> Self {
        Self { source, config }
    }

    /// Whether `file_name` has an allowed image extension.
    pub fn is_allowed(&self, file_name: &Path) -> bool {
        file_name
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.config
                    .allowed_extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    fn admitted_items(&self, images_dir: &Path, report: &mut BuildReport) -> Result<Vec<(String, PathBuf)>> {
        let mut items = Vec::new();
        for entry in fs::read_dir(images_dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %images_dir.display(), error = %e, "unreadable directory entry");
                    report.ignored += 1;
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() || !self.is_allowed(&path) {
                report.ignored += 1;
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => items.push((name, path)),
                Err(name) => {
                    warn!(item = ?name, "skipping file with non UTF-8 name");
                    report.ignored += 1;
                }
            }
        }
        report.admitted = items.len();
        Ok(items)
    }

    /// Collect one vector per admitted image into a store.
    ///
    /// Per-item failures are logged and skipped. Fails with `EmptyInput` if
    /// nothing succeeded and with `DimensionMismatch` if the successful items
    /// disagree on dimension.
    pub fn collect(&self, images_dir: &Path) -> Result<(FeatureVectorStore, BuildReport)> {
        let mut report = BuildReport::default();
        let items = self.admitted_items(images_dir, &mut report)?;
        info!(dir = %images_dir.display(), admitted = items.len(), "collecting features");

        // Ordered collect keeps results aligned with `items`.
        let results: Vec<Result<FeatureVector>> = items
            .par_iter()
            .map(|(_, path)| self.source.features_for(path))
            .collect();

        let mut pairs = Vec::with_capacity(items.len());
        for ((identifier, _), result) in items.into_iter().zip(results) {
            match result {
                Ok(vector) => {
                    debug!(item = %identifier, dimension = vector.dimension(), "features ready");
                    pairs.push((identifier, vector));
                }
                Err(e) => {
                    warn!(item = %identifier, error = %e, "skipping item");
                    report.failed.push(SkippedItem {
                        identifier,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if pairs.is_empty() {
            return Err(RetrievalError::EmptyInput {
                reason: format!(
                    "no features obtained from {} ({} admitted, {} failed)",
                    images_dir.display(),
                    report.admitted,
                    report.failed.len()
                ),
            });
        }

        let store = FeatureVectorStore::build(pairs)?;
        report.indexed = store.len();
        report.dimension = store.dimension();
        Ok((store, report))
    }

    /// Collect features and persist the store. Nothing is written on failure.
    pub fn build(&self, images_dir: &Path, paths: &ArtifactPaths) -> Result<BuildReport> {
        let (store, report) = self.collect(images_dir)?;
        store.persist(paths)?;
        info!(
            indexed = report.indexed,
            failed = report.failed.len(),
            ignored = report.ignored,
            dimension = report.dimension,
            "build complete"
        );
        Ok(report)
    }
}
