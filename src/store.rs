//! Feature vector store: identifiers paired positionally with vectors

use crate::error::{Result, RetrievalError};
use crate::flat_index::FlatIndex;
use crate::index::Index;
use crate::persistence::{self, ArtifactPaths};
use crate::vector::FeatureVector;

/// An ordered collection of (identifier, vector) pairs.
///
/// Held as two parallel sequences: `identifiers[i]` names `vectors[i]`.
/// Identifiers are not required to be unique.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVectorStore {
    identifiers: Vec<String>,
    vectors: Vec<FeatureVector>,
    dimension: usize,
}

impl FeatureVectorStore {
    /// Build a store from ordered pairs.
    ///
    /// The first vector fixes the dimension. Fails with `EmptyInput` when no
    /// pairs are given and with `DimensionMismatch` when any later vector
    /// disagrees with the first.
    pub fn build<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, FeatureVector)>,
        S: Into<String>,
    {
        let mut identifiers = Vec::new();
        let mut vectors: Vec<FeatureVector> = Vec::new();

        for (id, vector) in pairs {
            if let Some(first) = vectors.first() {
                vector.ensure_dimension(first.dimension())?;
            } else if vector.dimension() == 0 {
                return Err(RetrievalError::invalid("feature vectors must have at least one component"));
            }
            identifiers.push(id.into());
            vectors.push(vector);
        }

        let dimension = match vectors.first() {
            Some(v) => v.dimension(),
            None => {
                return Err(RetrievalError::EmptyInput {
                    reason: "no (identifier, vector) pairs to build from".to_string(),
                })
            }
        };

        Ok(Self {
            identifiers,
            vectors,
            dimension,
        })
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    pub fn vectors(&self) -> &[FeatureVector] {
        &self.vectors
    }

    /// Iterate over (identifier, vector) pairs in position order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureVector)> {
        self.identifiers
            .iter()
            .map(String::as_str)
            .zip(self.vectors.iter())
    }

    /// Construct the nearest-neighbor index over this store's vectors.
    pub fn to_index(&self) -> Result<FlatIndex> {
        FlatIndex::construct(self.dimension, &self.vectors)
    }

    /// Consume the store into a queryable (index, identifiers) pair.
    pub fn into_loaded(self) -> Result<LoadedIndex> {
        let index = FlatIndex::construct(self.dimension, &self.vectors)?;
        LoadedIndex::new(index, self.identifiers)
    }

    /// Write the index and identifier artifacts, replacing any existing pair.
    pub fn persist(&self, paths: &ArtifactPaths) -> Result<()> {
        persistence::persist(paths, &self.to_index()?, &self.identifiers)
    }
}

/// A built or loaded index together with its positionally aligned identifiers.
///
/// Immutable once constructed; a rebuild produces a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedIndex {
    index: FlatIndex,
    identifiers: Vec<String>,
}

impl LoadedIndex {
    /// Pair an index with its identifiers; lengths must agree.
    pub fn new(index: FlatIndex, identifiers: Vec<String>) -> Result<Self> {
        if index.len() != identifiers.len() {
            return Err(RetrievalError::invalid(format!(
                "index holds {} vectors but {} identifiers were given",
                index.len(),
                identifiers.len()
            )));
        }
        Ok(Self { index, identifiers })
    }

    /// Read a persisted artifact pair.
    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        persistence::load(paths)
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    /// Convert back into a store, e.g. to re-persist after loading.
    pub fn to_store(&self) -> FeatureVectorStore {
        FeatureVectorStore {
            identifiers: self.identifiers.clone(),
            vectors: self
                .index
                .rows()
                .map(|row| FeatureVector::new(row.to_vec()))
                .collect(),
            dimension: self.index.dimension(),
        }
    }
}
