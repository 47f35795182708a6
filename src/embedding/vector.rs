//! Fixed-layout vector codec and cosine similarity
//!
//! Embeddings are stored as little-endian f32 sequences in a BLOB column.
//! Encoding is lossless: no normalization, compression, or reordering.

use crate::error::{MaildexError, Result};

/// Byte width of a single vector element
pub const ELEMENT_WIDTH: usize = std::mem::size_of::<f32>();

/// Encode a vector as a little-endian byte sequence of `len * 4` bytes
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * ELEMENT_WIDTH);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode a byte sequence produced by [`encode_vector`]
///
/// Fails with `MalformedVector` when the length is not a whole number of
/// elements.
pub fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % ELEMENT_WIDTH != 0 {
        return Err(MaildexError::MalformedVector {
            len: bytes.len(),
            element_width: ELEMENT_WIDTH,
        });
    }

    Ok(bytes
        .chunks_exact(ELEMENT_WIDTH)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Cosine similarity between two equal-length vectors, in `[-1, 1]`
///
/// Returns 0.0 when either vector has zero magnitude. Fails with
/// `DimensionMismatch` when the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(MaildexError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (mag_a * mag_b))
}
