//! Feature vector type

use crate::error::{Result, RetrievalError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A fixed-length image embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    data: Vec<f32>,
}

impl FeatureVector {
    /// Create a new feature vector from a Vec<f32>
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// Number of components
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// Get the underlying data as a slice
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Fail with `DimensionMismatch` unless this vector has `expected` components.
    pub fn ensure_dimension(&self, expected: usize) -> Result<()> {
        if self.dimension() != expected {
            return Err(RetrievalError::DimensionMismatch {
                expected,
                actual: self.dimension(),
            });
        }
        Ok(())
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(data: Vec<f32>) -> Self {
        Self::new(data)
    }
}

/// Parses components separated by commas and/or whitespace, e.g. `"1.0, 2.0 3.0"`.
impl FromStr for FeatureVector {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self> {
        let data = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(|token| {
                token
                    .parse::<f32>()
                    .map_err(|_| RetrievalError::invalid(format!("Invalid float: {}", token)))
            })
            .collect::<Result<Vec<f32>>>()?;

        if data.is_empty() {
            return Err(RetrievalError::invalid("vector has no components"));
        }
        Ok(FeatureVector::new(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_creation() {
        let v = FeatureVector::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(v.dimension(), 3);
        assert_eq!(v.as_slice(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_parse_mixed_separators() {
        let v: FeatureVector = "1.0, 2.0 3.0\n4".parse().unwrap();
        assert_eq!(v.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let result = "1.0,abc".parse::<FeatureVector>();
        assert!(matches!(result, Err(RetrievalError::InvalidArgument { .. })));
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(" , ".parse::<FeatureVector>().is_err());
    }

    #[test]
    fn test_ensure_dimension() {
        let v = FeatureVector::new(vec![1.0, 2.0]);
        assert!(v.ensure_dimension(2).is_ok());
        assert!(matches!(
            v.ensure_dimension(3),
            Err(RetrievalError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }
}
