//! Distance metric used for ranking

/// Squared Euclidean (L2²) distance over two equal-length slices.
///
/// No square root is taken: ranking only needs an order-preserving metric.
/// Callers are responsible for checking lengths; extra components of the
/// longer slice are ignored.
#[inline]
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_squared_euclidean() {
        let d = squared_euclidean(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]);
        assert_relative_eq!(d, 27.0, epsilon = 1e-6);
    }

    #[test]
    fn test_same_vector_is_zero() {
        let v = [0.25, -3.5, 8.0];
        assert_eq!(squared_euclidean(&v, &v), 0.0);
    }

    #[test]
    fn test_unit_step() {
        let d = squared_euclidean(&[0.0, 0.0], &[1.0, 0.0]);
        assert_relative_eq!(d, 1.0);
    }
}
