use image::imageops::FilterType;
use image_hasher::{HashAlg, Hasher, HasherConfig};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid perceptual hash: {value}")]
    InvalidPerceptualHash { value: String },
}

/// SHA-256 digest of the raw bytes, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExactHash(pub String);

impl ExactHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 64-bit perceptual fingerprint. Serialised as 16 hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PerceptualHash(pub u64);

impl PerceptualHash {
    pub const BIT_LENGTH: u32 = u64::BITS;

    pub fn hamming_distance(&self, other: &PerceptualHash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// `1 - hamming / bit_length`, in [0, 1].
    pub fn similarity(&self, other: &PerceptualHash) -> f64 {
        1.0 - self.hamming_distance(other) as f64 / Self::BIT_LENGTH as f64
    }

    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.0)
    }
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<PerceptualHash> for String {
    fn from(hash: PerceptualHash) -> Self {
        hash.to_hex()
    }
}

impl TryFrom<String> for PerceptualHash {
    type Error = HashError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        u64::from_str_radix(&value, 16)
            .map(PerceptualHash)
            .map_err(|_| HashError::InvalidPerceptualHash { value })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentHashes {
    pub exact_hash: ExactHash,
    pub perceptual_hash: Option<PerceptualHash>,
}

/// Computes the exact digest and the perceptual fingerprint of an item.
pub struct ContentHasher {
    normalized_size: u32,
    hasher: Hasher,
}

impl ContentHasher {
    pub fn new(normalized_size: u32) -> Self {
        let hasher = HasherConfig::new()
            .hash_size(8, 8)
            .preproc_dct()
            .hash_alg(HashAlg::Mean)
            .to_hasher();

        Self {
            normalized_size: normalized_size.max(8),
            hasher,
        }
    }

    pub fn hash(&self, bytes: &[u8]) -> ContentHashes {
        ContentHashes {
            exact_hash: Self::exact_hash(bytes),
            perceptual_hash: self.perceptual_hash(bytes),
        }
    }

    /// Fails only when the file cannot be read; undecodable content still
    /// yields an exact hash.
    pub fn hash_file(&self, file_path: &Path) -> Result<ContentHashes, HashError> {
        let bytes = fs::read(file_path)?;
        let hashes = self.hash(&bytes);
        if hashes.perceptual_hash.is_none() {
            log::debug!(
                "No perceptual hash for {}; exact matching only",
                file_path.display()
            );
        }
        Ok(hashes)
    }

    /// Hash many files in parallel. Results keep the input order.
    pub fn hash_files_batch(
        &self,
        file_paths: &[&Path],
    ) -> Vec<(PathBuf, Result<ContentHashes, HashError>)> {
        use rayon::prelude::*;

        file_paths
            .par_iter()
            .map(|path| (path.to_path_buf(), self.hash_file(path)))
            .collect()
    }

    pub fn exact_hash(bytes: &[u8]) -> ExactHash {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        ExactHash(format!("{:x}", hasher.finalize()))
    }

    /// Normalise to a square grayscale grid, DCT, then threshold against the mean.
    pub fn perceptual_hash(&self, bytes: &[u8]) -> Option<PerceptualHash> {
        let image = match image::load_from_memory(bytes) {
            Ok(image) => image,
            Err(e) => {
                log::debug!("Content not decodable as an image: {}", e);
                return None;
            }
        };

        let normalized = image
            .resize_exact(self.normalized_size, self.normalized_size, FilterType::Triangle)
            .grayscale();
        let hash = self.hasher.hash_image(&normalized);

        let bytes: [u8; 8] = match hash.as_bytes().try_into() {
            Ok(bytes) => bytes,
            Err(_) => {
                log::warn!(
                    "Unexpected perceptual hash length: {} bytes",
                    hash.as_bytes().len()
                );
                return None;
            }
        };
        Some(PerceptualHash(u64::from_be_bytes(bytes)))
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new(64)
    }
}

impl fmt::Debug for ContentHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentHasher")
            .field("normalized_size", &self.normalized_size)
            .finish_non_exhaustive()
    }
}
