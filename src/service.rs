//! Retrieval service: query vector in, ranked identifiers out.

use crate::error::{Result, RetrievalError};
use crate::features::FeatureExtractor;
use crate::index::Index;
use crate::persistence::ArtifactPaths;
use crate::store::LoadedIndex;
use crate::vector::FeatureVector;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

/// Rank `identifiers` by similarity to `query`.
///
/// Fails with `InvalidArgument` when `top_k < 1` and with `DimensionMismatch`
/// when the query does not match the index. Returns at most `top_k`
/// identifiers, fewer if the index is smaller; distances are not exposed.
pub fn retrieve<I: Index + ?Sized>(
    index: &I,
    identifiers: &[String],
    query: &FeatureVector,
    top_k: usize,
) -> Result<Vec<String>> {
    Ok(retrieve_scored(index, identifiers, query, top_k)?
        .into_iter()
        .map(|(id, _)| id)
        .collect())
}

/// Like [`retrieve`], keeping each identifier's squared distance.
pub fn retrieve_scored<I: Index + ?Sized>(
    index: &I,
    identifiers: &[String],
    query: &FeatureVector,
    top_k: usize,
) -> Result<Vec<(String, f32)>> {
    if top_k < 1 {
        return Err(RetrievalError::invalid("top_k must be at least 1"));
    }
    if index.len() != identifiers.len() {
        return Err(RetrievalError::invalid(format!(
            "index holds {} vectors but {} identifiers",
            index.len(),
            identifiers.len()
        )));
    }

    let neighbors = index.query(query.as_slice(), top_k)?;
    Ok(neighbors
        .into_iter()
        .map(|n| (identifiers[n.position].clone(), n.distance))
        .collect())
}

/// Process-wide retrieval state: the currently published index pair.
///
/// Readers take a cheap `Arc` snapshot and query it without holding any
/// lock. A reload builds the replacement completely, then swaps the `Arc`;
/// the index and its identifiers are always replaced together.
pub struct ServiceContext {
    current: RwLock<Arc<LoadedIndex>>,
    paths: Option<ArtifactPaths>,
}

impl ServiceContext {
    /// Serve an already built index. `reload` is unavailable.
    pub fn new(loaded: LoadedIndex) -> Self {
        Self {
            current: RwLock::new(Arc::new(loaded)),
            paths: None,
        }
    }

    /// Load the artifact pair once; `reload` re-reads the same paths.
    pub fn open(paths: ArtifactPaths) -> Result<Self> {
        let loaded = LoadedIndex::load(&paths)?;
        Ok(Self {
            current: RwLock::new(Arc::new(loaded)),
            paths: Some(paths),
        })
    }

    /// The index pair live at the time of the call.
    pub fn snapshot(&self) -> Arc<LoadedIndex> {
        // The guarded value is a single Arc, so a poisoned lock still holds a
        // complete pair.
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Publish a new index pair, returning the one it replaced.
    pub fn replace(&self, loaded: LoadedIndex) -> Arc<LoadedIndex> {
        let next = Arc::new(loaded);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }

    /// Re-read the artifacts this context was opened from and swap them in.
    /// On failure the live index is left as it was.
    pub fn reload(&self) -> Result<Arc<LoadedIndex>> {
        let paths = self
            .paths
            .as_ref()
            .ok_or_else(|| RetrievalError::invalid("context was not opened from artifact paths"))?;
        let loaded = LoadedIndex::load(paths)?;
        let vectors = loaded.len();
        self.replace(loaded);
        info!(vectors, "index reloaded");
        Ok(self.snapshot())
    }

    /// Rank identifiers by similarity to `query`.
    pub fn retrieve(&self, query: &FeatureVector, top_k: usize) -> Result<Vec<String>> {
        let loaded = self.snapshot();
        retrieve(loaded.index(), loaded.identifiers(), query, top_k)
    }

    /// Ranked identifiers with their squared distances.
    pub fn retrieve_scored(&self, query: &FeatureVector, top_k: usize) -> Result<Vec<(String, f32)>> {
        let loaded = self.snapshot();
        retrieve_scored(loaded.index(), loaded.identifiers(), query, top_k)
    }

    /// Extract features from raw image bytes and retrieve similar images.
    pub fn retrieve_image(
        &self,
        extractor: &dyn FeatureExtractor,
        image: &[u8],
        top_k: usize,
    ) -> Result<Vec<String>> {
        if top_k < 1 {
            return Err(RetrievalError::invalid("top_k must be at least 1"));
        }
        let query = extractor.extract(image)?;
        self.retrieve(&query, top_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FeatureVectorStore;

    fn abc() -> LoadedIndex {
        FeatureVectorStore::build(vec![
            ("A", FeatureVector::new(vec![0.0, 0.0])),
            ("B", FeatureVector::new(vec![1.0, 0.0])),
            ("C", FeatureVector::new(vec![5.0, 5.0])),
        ])
        .unwrap()
        .into_loaded()
        .unwrap()
    }

    struct FixedExtractor(Vec<f32>);

    impl FeatureExtractor for FixedExtractor {
        fn extract(&self, _image: &[u8]) -> Result<FeatureVector> {
            Ok(FeatureVector::new(self.0.clone()))
        }
    }

    #[test]
    fn test_retrieve_ranked() {
        let ctx = ServiceContext::new(abc());
        let ranked = ctx.retrieve(&FeatureVector::new(vec![0.0, 0.0]), 2).unwrap();
        assert_eq!(ranked, vec!["A", "B"]);
    }

    #[test]
    fn test_retrieve_scored_keeps_distances() {
        let ctx = ServiceContext::new(abc());
        let scored = ctx
            .retrieve_scored(&FeatureVector::new(vec![0.0, 0.0]), 10)
            .unwrap();
        assert_eq!(
            scored,
            vec![
                ("A".to_string(), 0.0),
                ("B".to_string(), 1.0),
                ("C".to_string(), 50.0)
            ]
        );
    }

    #[test]
    fn test_retrieve_rejects_zero_top_k() {
        let ctx = ServiceContext::new(abc());
        assert!(matches!(
            ctx.retrieve(&FeatureVector::new(vec![0.0, 0.0]), 0),
            Err(RetrievalError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_retrieve_image_uses_extractor() {
        let ctx = ServiceContext::new(abc());
        let ranked = ctx
            .retrieve_image(&FixedExtractor(vec![5.0, 4.0]), b"jpeg", 1)
            .unwrap();
        assert_eq!(ranked, vec!["C"]);
    }

    #[test]
    fn test_replace_swaps_whole_pair() {
        let ctx = ServiceContext::new(abc());
        let before = ctx.snapshot();

        let replacement = FeatureVectorStore::build(vec![("Z", FeatureVector::new(vec![9.0]))])
            .unwrap()
            .into_loaded()
            .unwrap();
        let old = ctx.replace(replacement);

        assert!(Arc::ptr_eq(&before, &old));
        // Outstanding snapshots keep answering from the old pair.
        assert_eq!(
            retrieve(before.index(), before.identifiers(), &FeatureVector::new(vec![0.0, 0.0]), 1).unwrap(),
            vec!["A"]
        );
        assert_eq!(ctx.retrieve(&FeatureVector::new(vec![8.0]), 5).unwrap(), vec!["Z"]);
    }

    #[test]
    fn test_reload_without_paths_fails() {
        let ctx = ServiceContext::new(abc());
        assert!(ctx.reload().is_err());
        assert_eq!(ctx.snapshot().len(), 3);
    }
}
