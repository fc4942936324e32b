//! # Image Retrieval
//!
//! Find the images in a fixed collection that look most like a query image.
//!
//! Every reference image is summarised by a fixed-length feature vector
//! (produced by an external embedding model). This library provides:
//! - A feature vector store pairing each vector with its filename
//! - An exact, brute-force nearest-neighbor index (squared Euclidean distance)
//! - A batch builder that turns an image directory into persisted artifacts
//! - A retrieval service with atomic hot-reload, plus an HTTP front end
//!
//! ## Example
//!
//! ```rust
//! use image_retrieval::{retrieve, FeatureVector, FeatureVectorStore};
//!
//! let store = FeatureVectorStore::build(vec![
//!     ("a.jpg", FeatureVector::new(vec![0.0, 0.0])),
//!     ("b.jpg", FeatureVector::new(vec![1.0, 0.0])),
//!     ("c.jpg", FeatureVector::new(vec![5.0, 5.0])),
//! ])?;
//! let loaded = store.into_loaded()?;
//!
//! let query = FeatureVector::new(vec![0.0, 0.0]);
//! let ranked = retrieve(loaded.index(), loaded.identifiers(), &query, 2)?;
//! assert_eq!(ranked, vec!["a.jpg", "b.jpg"]);
//! # Ok::<(), image_retrieval::RetrievalError>(())
//! ```

pub mod builder;
pub mod distance;
pub mod error;
pub mod features;
pub mod flat_index;
pub mod index;
pub mod metrics;
pub mod neighbor_queue;
pub mod persistence;
pub mod server;
pub mod service;
pub mod store;
pub mod vector;

pub use builder::{BuildReport, BuilderConfig, IndexBuilder};
pub use error::{Result, RetrievalError};
pub use features::{CommandExtractor, ExtractorFeatures, FeatureExtractor, FeatureSource, PrecomputedFeatures};
pub use flat_index::FlatIndex;
pub use index::Index;
pub use neighbor_queue::Neighbor;
pub use persistence::ArtifactPaths;
pub use service::{retrieve, retrieve_scored, ServiceContext};
pub use store::{FeatureVectorStore, LoadedIndex};
pub use vector::FeatureVector;
