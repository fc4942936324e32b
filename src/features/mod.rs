//! Feature acquisition: where an item's vector comes from.
//!
//! The neural network that turns pixels into an embedding lives outside this
//! crate. It is consumed through [`FeatureExtractor`]; the index builder asks a
//! [`FeatureSource`] for one vector per admitted image file.

pub mod command;
pub mod npy;

pub use command::CommandExtractor;

use crate::error::{Result, RetrievalError};
use crate::vector::FeatureVector;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Turns raw image bytes into a fixed-dimension feature vector.
///
/// Calls may be slow and blocking.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, image: &[u8]) -> Result<FeatureVector>;
}

impl<E: FeatureExtractor + ?Sized> FeatureExtractor for Arc<E> {
    fn extract(&self, image: &[u8]) -> Result<FeatureVector> {
        (**self).extract(image)
    }
}

/// Produces the feature vector for one image file during a build.
pub trait FeatureSource: Send + Sync {
    fn features_for(&self, image_path: &Path) -> Result<FeatureVector>;
}

fn item_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Reads vectors saved ahead of time as `<features_dir>/<image stem>.<extension>`.
#[derive(Debug, Clone)]
pub struct PrecomputedFeatures {
    dir: PathBuf,
    extension: String,
}

impl PrecomputedFeatures {
    /// Look up `<stem>.npy` files in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_extension(dir, "npy")
    }

    pub fn with_extension(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    /// Where the feature file for `image_path` is expected.
    pub fn feature_path(&self, image_path: &Path) -> Option<PathBuf> {
        let mut name = image_path.file_stem()?.to_os_string();
        name.push(".");
        name.push(&self.extension);
        Some(self.dir.join(name))
    }
}

impl FeatureSource for PrecomputedFeatures {
    fn features_for(&self, image_path: &Path) -> Result<FeatureVector> {
        let extraction_error = |reason: String| RetrievalError::Extraction {
            item: item_name(image_path),
            reason,
        };

        let path = self
            .feature_path(image_path)
            .ok_or_else(|| extraction_error("path has no file stem".to_string()))?;
        let bytes = fs::read(&path)
            .map_err(|e| extraction_error(format!("{}: {}", path.display(), e)))?;
        let values = npy::decode(&bytes).map_err(|e| extraction_error(e.to_string()))?;
        Ok(FeatureVector::new(values))
    }
}

/// Reads each image file and passes its bytes through an extractor.
#[derive(Debug, Clone)]
pub struct ExtractorFeatures<E> {
    extractor: E,
}

impl<E: FeatureExtractor> ExtractorFeatures<E> {
    pub fn new(extractor: E) -> Self {
        Self { extractor }
    }
}

impl<E: FeatureExtractor> FeatureSource for ExtractorFeatures<E> {
    fn features_for(&self, image_path: &Path) -> Result<FeatureVector> {
        let item = item_name(image_path);
        let bytes = fs::read(image_path).map_err(|e| RetrievalError::Extraction {
            item: item.clone(),
            reason: e.to_string(),
        })?;
        self.extractor
            .extract(&bytes)
            .map_err(|e| RetrievalError::Extraction {
                item,
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Uses the byte length as a one-dimensional "embedding".
    struct LengthExtractor;

    impl FeatureExtractor for LengthExtractor {
        fn extract(&self, image: &[u8]) -> Result<FeatureVector> {
            if image.is_empty() {
                return Err(RetrievalError::invalid("empty image"));
            }
            Ok(FeatureVector::new(vec![image.len() as f32]))
        }
    }

    #[test]
    fn test_precomputed_lookup_by_stem() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("BZ0152a.npy"), npy::encode_f32(&[1.0, 2.0])).unwrap();

        let source = PrecomputedFeatures::new(dir.path());
        let v = source
            .features_for(Path::new("/images/BZ0152a.jpg"))
            .unwrap();
        assert_eq!(v.as_slice(), &[1.0, 2.0]);
    }

    #[test]
    fn test_precomputed_missing_file() {
        let dir = TempDir::new().unwrap();
        let source = PrecomputedFeatures::new(dir.path());
        let err = source.features_for(Path::new("missing.png")).unwrap_err();
        assert!(matches!(err, RetrievalError::Extraction { ref item, .. } if item == "missing.png"));
    }

    #[test]
    fn test_extractor_source() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("a.jpg");
        fs::write(&image, b"12345").unwrap();

        let source = ExtractorFeatures::new(LengthExtractor);
        assert_eq!(source.features_for(&image).unwrap().as_slice(), &[5.0]);
    }

    #[test]
    fn test_extractor_failure_names_item() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("empty.jpg");
        fs::write(&image, b"").unwrap();

        let source = ExtractorFeatures::new(Arc::new(LengthExtractor));
        let err = source.features_for(&image).unwrap_err();
        assert!(matches!(err, RetrievalError::Extraction { ref item, .. } if item == "empty.jpg"));
    }
}
