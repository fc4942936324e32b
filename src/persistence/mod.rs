//! Persistence layer: the index and identifier artifacts, always handled as a pair.
//!
//! The index artifact records a digest of the identifiers it was written
//! with; `load` rejects a pair whose files come from different builds.
//!
//! Writers must not run concurrently against the same paths; building is an
//! offline, operator-invoked step and no file lock is taken.

pub mod artifact;
pub mod identifiers;

use crate::error::{Result, RetrievalError};
use crate::flat_index::FlatIndex;
use crate::index::Index;
use crate::store::LoadedIndex;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default artifact file names inside a data directory.
pub const INDEX_FILE: &str = "features.index";
pub const IDENTIFIERS_FILE: &str = "identifiers.json";

/// Locations of the two artifacts that make up a persisted index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub index: PathBuf,
    pub identifiers: PathBuf,
}

impl ArtifactPaths {
    pub fn new(index: impl Into<PathBuf>, identifiers: impl Into<PathBuf>) -> Self {
        Self {
            index: index.into(),
            identifiers: identifiers.into(),
        }
    }

    /// Default file names under `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join(INDEX_FILE), dir.join(IDENTIFIERS_FILE))
    }

    /// Whether both artifacts exist.
    pub fn exist(&self) -> bool {
        self.index.exists() && self.identifiers.exists()
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("artifact"));
    name.push(".tmp");
    path.with_file_name(name)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Persist an index and its identifiers, replacing any existing pair.
///
/// Both artifacts are first written to `.tmp` siblings and only renamed into
/// place once both writes succeeded, so a failure leaves the previous pair
/// untouched.
pub fn persist(paths: &ArtifactPaths, index: &FlatIndex, identifiers: &[String]) -> Result<()> {
    if index.len() != identifiers.len() {
        return Err(RetrievalError::invalid(format!(
            "refusing to persist {} vectors with {} identifiers",
            index.len(),
            identifiers.len()
        )));
    }

    ensure_parent(&paths.index)?;
    ensure_parent(&paths.identifiers)?;

    let index_tmp = staging_path(&paths.index);
    let identifiers_tmp = staging_path(&paths.identifiers);

    let staged = artifact::write(&index_tmp, index, identifiers::digest(identifiers))
        .and_then(|_| identifiers::write(&identifiers_tmp, identifiers));
    if let Err(e) = staged {
        let _ = fs::remove_file(&index_tmp);
        let _ = fs::remove_file(&identifiers_tmp);
        return Err(e);
    }
    debug!(index = %index_tmp.display(), identifiers = %identifiers_tmp.display(), "artifacts staged");

    fs::rename(&index_tmp, &paths.index)?;
    fs::rename(&identifiers_tmp, &paths.identifiers)?;

    info!(
        vectors = index.len(),
        dimension = index.dimension(),
        index = %paths.index.display(),
        identifiers = %paths.identifiers.display(),
        "persisted index"
    );
    Ok(())
}

/// Load an artifact pair. Fails with `CorruptArtifact` if either file is
/// unreadable or malformed, if their lengths disagree, or if the identifiers
/// do not match the digest recorded in the index.
pub fn load(paths: &ArtifactPaths) -> Result<LoadedIndex> {
    let artifact = artifact::read(&paths.index)?;
    let identifiers = identifiers::read(&paths.identifiers)?;
    let index = artifact.index;

    if index.len() != identifiers.len() {
        return Err(RetrievalError::corrupt(
            &paths.identifiers,
            format!(
                "{} identifiers do not match {} vectors in {}",
                identifiers.len(),
                index.len(),
                paths.index.display()
            ),
        ));
    }
    if identifiers::digest(&identifiers) != artifact.identifiers_digest {
        return Err(RetrievalError::corrupt(
            &paths.identifiers,
            format!(
                "identifiers were not written with the index in {}",
                paths.index.display()
            ),
        ));
    }

    info!(
        vectors = index.len(),
        dimension = index.dimension(),
        "loaded index"
    );
    LoadedIndex::new(index, identifiers)
}
