//! Minimal reader/writer for NumPy `.npy` feature files.
//!
//! Only little-endian `float32`/`float64` arrays with at most one non-unit
//! axis are accepted: `(D,)`, `(1, D)`, `(D, 1, 1)` and so on. Such arrays
//! have the same element order in C and Fortran layout.

use crate::error::{Result, RetrievalError};

const MAGIC: &[u8; 6] = b"\x93NUMPY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dtype {
    F32,
    F64,
}

impl Dtype {
    fn size(self) -> usize {
        match self {
            Dtype::F32 => 4,
            Dtype::F64 => 8,
        }
    }
}

fn malformed(reason: impl Into<String>) -> RetrievalError {
    RetrievalError::SerializationError(format!("npy: {}", reason.into()))
}

/// Text following `'key':` in a header dict literal.
fn dict_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("'{}':", key);
    let start = header.find(&needle)? + needle.len();
    Some(header[start..].trim_start())
}

fn parse_descr(header: &str) -> Result<Dtype> {
    let value = dict_value(header, "descr").ok_or_else(|| malformed("header has no descr"))?;
    let quote = value.chars().next().ok_or_else(|| malformed("empty descr"))?;
    let rest = &value[quote.len_utf8()..];
    let end = rest.find(quote).ok_or_else(|| malformed("unterminated descr"))?;
    match &rest[..end] {
        "<f4" => Ok(Dtype::F32),
        "<f8" => Ok(Dtype::F64),
        other => Err(malformed(format!("unsupported dtype {}", other))),
    }
}

fn parse_shape(header: &str) -> Result<Vec<usize>> {
    let value = dict_value(header, "shape").ok_or_else(|| malformed("header has no shape"))?;
    let open = value.find('(').ok_or_else(|| malformed("shape is not a tuple"))?;
    let close = value.find(')').ok_or_else(|| malformed("shape is not a tuple"))?;
    if close < open {
        return Err(malformed("shape is not a tuple"));
    }
    value[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|axis| !axis.is_empty())
        .map(|axis| {
            axis.parse::<usize>()
                .map_err(|_| malformed(format!("invalid axis length {}", axis)))
        })
        .collect()
}

/// Decode a `.npy` file into a flat vector of f32 components.
pub fn decode(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() < 10 || &bytes[0..6] != MAGIC {
        return Err(malformed("missing magic string"));
    }
    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(malformed("truncated header length"));
            }
            let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
            (len as usize, 12)
        }
        v => return Err(malformed(format!("unsupported format version {}", v))),
    };

    let data_start = header_start + header_len;
    let header = bytes
        .get(header_start..data_start)
        .ok_or_else(|| malformed("truncated header"))?;
    let header = std::str::from_utf8(header).map_err(|_| malformed("header is not text"))?;

    let dtype = parse_descr(header)?;
    let shape = parse_shape(header)?;
    if shape.iter().filter(|&&axis| axis > 1).count() > 1 {
        return Err(malformed(format!("expected a single feature axis, got shape {:?}", shape)));
    }
    let expected_bytes = shape
        .iter()
        .try_fold(dtype.size(), |acc, &axis| acc.checked_mul(axis))
        .ok_or_else(|| malformed("shape overflows"))?;

    let data = &bytes[data_start..];
    if data.len() != expected_bytes {
        return Err(malformed(format!(
            "expected {} bytes of data, found {}",
            expected_bytes,
            data.len()
        )));
    }

    let values = match dtype {
        Dtype::F32 => data
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
        Dtype::F64 => data
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32)
            .collect(),
    };
    Ok(values)
}

/// Encode a 1-D `float32` array in `.npy` version 1.0 format.
pub fn encode_f32(values: &[f32]) -> Vec<u8> {
    let mut header = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({},), }}",
        values.len()
    );
    // Magic + version + length + header + '\n' is padded to a multiple of 64.
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    header.push('\n');

    let mut bytes = Vec::with_capacity(10 + header.len() + values.len() * 4);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&[1, 0]);
    bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
    bytes.extend_from_slice(header.as_bytes());
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_header(header: &str, data: &[u8]) -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(data);
        bytes
    }

    #[test]
    fn test_encode_decode() {
        let values = vec![0.5, -1.25, 3.0];
        let bytes = encode_f32(&values);
        assert_eq!((bytes.len() - values.len() * 4) % 64, 0);
        assert_eq!(decode(&bytes).unwrap(), values);
    }

    #[test]
    fn test_resnet_pooled_shape() {
        // Pooled CNN output before squeezing: (1, D, 1, 1)
        let data: Vec<u8> = [1.0f32, 2.0].iter().flat_map(|v| v.to_le_bytes()).collect();
        let bytes = with_header(
            "{'descr': '<f4', 'fortran_order': False, 'shape': (1, 2, 1, 1), }\n",
            &data,
        );
        assert_eq!(decode(&bytes).unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_float64_is_narrowed() {
        let data: Vec<u8> = [1.5f64, -2.0].iter().flat_map(|v| v.to_le_bytes()).collect();
        let bytes = with_header(
            "{'descr': '<f8', 'fortran_order': False, 'shape': (2,), }\n",
            &data,
        );
        assert_eq!(decode(&bytes).unwrap(), vec![1.5, -2.0]);
    }

    #[test]
    fn test_rejects_matrix() {
        let data = vec![0u8; 16];
        let bytes = with_header(
            "{'descr': '<f4', 'fortran_order': False, 'shape': (2, 2), }\n",
            &data,
        );
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn test_rejects_unsupported_dtype() {
        let bytes = with_header(
            "{'descr': '<i8', 'fortran_order': False, 'shape': (1,), }\n",
            &[0u8; 8],
        );
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn test_rejects_short_data() {
        let mut bytes = encode_f32(&[1.0, 2.0]);
        bytes.truncate(bytes.len() - 2);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn test_rejects_non_npy() {
        assert!(decode(b"definitely not numpy").is_err());
    }
}
