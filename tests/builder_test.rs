//! Index builder: directory scanning, per-item failures, persistence safety.

use image_retrieval::features::npy;
use image_retrieval::{
    ArtifactPaths, FeatureExtractor, ExtractorFeatures, FeatureVector, IndexBuilder,
    LoadedIndex, PrecomputedFeatures, Result, RetrievalError,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

struct Fixture {
    images: TempDir,
    features: TempDir,
    output: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            images: TempDir::new().unwrap(),
            features: TempDir::new().unwrap(),
            output: TempDir::new().unwrap(),
        }
    }

    fn add(&self, image: &str, vector: &[f32]) {
        fs::write(self.images.path().join(image), b"image bytes").unwrap();
        let stem = Path::new(image).file_stem().unwrap().to_str().unwrap();
        fs::write(
            self.features.path().join(format!("{}.npy", stem)),
            npy::encode_f32(vector),
        )
        .unwrap();
    }

    fn builder(&self) -> IndexBuilder<PrecomputedFeatures> {
        IndexBuilder::new(PrecomputedFeatures::new(self.features.path()))
    }

    fn paths(&self) -> ArtifactPaths {
        ArtifactPaths::in_dir(self.output.path())
    }
}

/// Embeds an image as the sum and length of its bytes.
struct ByteStats;

impl FeatureExtractor for ByteStats {
    fn extract(&self, image: &[u8]) -> Result<FeatureVector> {
        if image.starts_with(b"corrupt") {
            return Err(RetrievalError::InvalidArgument {
                reason: "cannot decode image".to_string(),
            });
        }
        let sum: u32 = image.iter().map(|&b| b as u32).sum();
        Ok(FeatureVector::new(vec![sum as f32, image.len() as f32]))
    }
}

#[test]
fn test_build_and_load() {
    let fx = Fixture::new();
    fx.add("a.jpg", &[0.0, 0.0]);
    fx.add("b.JPEG", &[1.0, 0.0]);
    fx.add("c.png", &[5.0, 5.0]);

    let report = fx.builder().build(fx.images.path(), &fx.paths()).unwrap();
    assert_eq!(report.indexed, 3);

    let loaded = LoadedIndex::load(&fx.paths()).unwrap();
    assert_eq!(loaded.len(), 3);

    // Directory order is unspecified; check the pairing instead.
    let store = loaded.to_store();
    for (id, vector) in store.iter() {
        let expected: &[f32] = match id {
            "a.jpg" => &[0.0, 0.0],
            "b.JPEG" => &[1.0, 0.0],
            "c.png" => &[5.0, 5.0],
            other => panic!("unexpected identifier {}", other),
        };
        assert_eq!(vector.as_slice(), expected);
    }
}

#[test]
fn test_failed_items_are_skipped() {
    let fx = Fixture::new();
    fx.add("a.jpg", &[0.0, 1.0]);
    fs::write(fx.images.path().join("no_features.jpg"), b"x").unwrap();
    fs::write(fx.features.path().join("broken.npy"), b"garbage").unwrap();
    fs::write(fx.images.path().join("broken.bmp"), b"x").unwrap();
    fs::write(fx.images.path().join("labels.csv"), b"filename,artist").unwrap();
    fs::create_dir(fx.images.path().join("nested.jpg")).unwrap();

    let report = fx.builder().build(fx.images.path(), &fx.paths()).unwrap();

    assert_eq!(report.admitted, 3);
    assert_eq!(report.indexed, 1);
    assert_eq!(report.ignored, 2);
    let mut failed: Vec<&str> = report.failed.iter().map(|f| f.identifier.as_str()).collect();
    failed.sort();
    assert_eq!(failed, vec!["broken.bmp", "no_features.jpg"]);

    let loaded = LoadedIndex::load(&fx.paths()).unwrap();
    assert_eq!(loaded.identifiers(), &["a.jpg"]);
}

#[test]
fn test_empty_build_leaves_prior_artifacts() {
    let fx = Fixture::new();
    fx.add("a.jpg", &[0.0, 1.0]);
    fx.builder().build(fx.images.path(), &fx.paths()).unwrap();
    let index_before = fs::read(&fx.paths().index).unwrap();
    let ids_before = fs::read(&fx.paths().identifiers).unwrap();

    let empty = TempDir::new().unwrap();
    fs::write(empty.path().join("readme.txt"), b"no images").unwrap();
    let result = fx.builder().build(empty.path(), &fx.paths());

    assert!(matches!(result, Err(RetrievalError::EmptyInput { .. })));
    assert_eq!(fs::read(&fx.paths().index).unwrap(), index_before);
    assert_eq!(fs::read(&fx.paths().identifiers).unwrap(), ids_before);
}

#[test]
fn test_all_items_failing_is_empty_input() {
    let fx = Fixture::new();
    fs::write(fx.images.path().join("a.jpg"), b"x").unwrap();

    let result = fx.builder().build(fx.images.path(), &fx.paths());
    assert!(matches!(result, Err(RetrievalError::EmptyInput { .. })));
    assert!(!fx.paths().index.exists());
    assert!(!fx.paths().identifiers.exists());
}

#[test]
fn test_mixed_dimensions_abort_before_persisting() {
    let fx = Fixture::new();
    fx.add("a.jpg", &[0.0, 1.0]);
    fx.add("b.jpg", &[0.0, 1.0, 2.0]);

    let result = fx.builder().build(fx.images.path(), &fx.paths());
    assert!(matches!(result, Err(RetrievalError::DimensionMismatch { .. })));
    assert!(!fx.paths().index.exists());
    assert!(!fx.paths().identifiers.exists());
}

#[test]
fn test_build_through_extractor() {
    let fx = Fixture::new();
    fs::write(fx.images.path().join("one.jpg"), [1u8, 1, 1]).unwrap();
    fs::write(fx.images.path().join("two.png"), [2u8, 2]).unwrap();
    fs::write(fx.images.path().join("bad.jpg"), b"corrupt!").unwrap();

    let builder = IndexBuilder::new(ExtractorFeatures::new(ByteStats));
    let report = builder.build(fx.images.path(), &fx.paths()).unwrap();
    assert_eq!(report.indexed, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].identifier, "bad.jpg");

    let loaded = LoadedIndex::load(&fx.paths()).unwrap();
    let ranked = image_retrieval::retrieve(
        loaded.index(),
        loaded.identifiers(),
        &FeatureVector::new(vec![4.0, 2.0]),
        1,
    )
    .unwrap();
    assert_eq!(ranked, vec!["two.png"]);
}
