//! Dual 64-bit perceptual fingerprints.
//!
//! Two hashes are derived from the same image by different methods: a
//! DCT-preprocessed mean hash (frequency structure) and a gradient hash
//! (horizontal brightness differences). A match confirmed by both carries
//! far lower false-positive risk than either alone.

use image::DynamicImage;
use image_hasher::{HashAlg, HasherConfig};

use crate::error::DedupError;

/// A pair of 64-bit perceptual fingerprints, rendered as 16 hex chars each
/// when persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerceptualHash {
    /// Primary DCT-based hash; the LSH index bands over this value
    pub phash: u64,
    /// Secondary gradient hash used to confirm candidate matches
    pub dhash: u64,
}

impl PerceptualHash {
    /// Render the primary hash as 16 lowercase hex chars.
    pub fn phash_hex(&self) -> String {
        format!("{:016x}", self.phash)
    }

    /// Render the secondary hash as 16 lowercase hex chars.
    pub fn dhash_hex(&self) -> String {
        format!("{:016x}", self.dhash)
    }

    /// Parse from the persisted hex form. `None` unless both values are
    /// exactly 16 hex chars — anything else is a malformed record.
    pub fn from_hex(phash: &str, dhash: &str) -> Option<Self> {
        if phash.len() != 16 || dhash.len() != 16 {
            return None;
        }
        Some(Self {
            phash: u64::from_str_radix(phash, 16).ok()?,
            dhash: u64::from_str_radix(dhash, 16).ok()?,
        })
    }
}

/// Count of differing bits between two 64-bit hashes.
pub fn hamming(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Computes both perceptual fingerprints for an image.
///
/// The hashers are pre-configured and cached to avoid re-allocating the
/// same `HasherConfig` for every image.
pub struct HashComputer {
    phash: image_hasher::Hasher,
    dhash: image_hasher::Hasher,
}

impl Default for HashComputer {
    fn default() -> Self {
        Self::new()
    }
}

impl HashComputer {
    /// Create a computer with 8x8 (64-bit) hash configurations.
    pub fn new() -> Self {
        let phash = HasherConfig::new()
            .hash_size(8, 8)
            .preproc_dct()
            .hash_alg(HashAlg::Mean)
            .to_hasher();
        let dhash = HasherConfig::new()
            .hash_size(8, 8)
            .hash_alg(HashAlg::Gradient)
            .to_hasher();
        Self { phash, dhash }
    }

    /// Compute both fingerprints from raw image bytes.
    pub fn compute(&self, bytes: &[u8]) -> Result<PerceptualHash, DedupError> {
        if bytes.is_empty() {
            return Err(DedupError::EmptyInput);
        }
        let image = image::load_from_memory(bytes)
            .map_err(|e| DedupError::Unreadable(e.to_string()))?;
        Ok(self.compute_image(&image))
    }

    /// Compute both fingerprints from a decoded image.
    pub fn compute_image(&self, image: &DynamicImage) -> PerceptualHash {
        PerceptualHash {
            phash: hash_to_u64(&self.phash.hash_image(image)),
            dhash: hash_to_u64(&self.dhash.hash_image(image)),
        }
    }
}

/// Pack the 64 hash bits into a u64, big-endian over the hash bytes.
fn hash_to_u64(hash: &image_hasher::ImageHash) -> u64 {
    let mut buf = [0u8; 8];
    let bytes = hash.as_bytes();
    buf[..bytes.len().min(8)].copy_from_slice(&bytes[..bytes.len().min(8)]);
    u64::from_be_bytes(buf)
}
