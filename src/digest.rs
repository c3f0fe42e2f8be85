//! SHA256 digest utilities.
//!
//! Blobs are hashed incrementally while they stream to the registry, so the
//! digest always reflects exactly the bytes as transmitted, in transmission
//! order.

use sha2::{Digest, Sha256};

/// Docker digest of the empty byte sequence, used when finalizing a
/// zero-byte blob.
pub const EMPTY_BLOB_DIGEST: &str =
    "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Incremental SHA256 accumulator producing Docker-format digests.
pub struct DigestAccumulator {
    hasher: Sha256,
}

impl DigestAccumulator {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    /// Feed the next chunk of the blob, in transmission order.
    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Consume the accumulator and return `sha256:<hex>` over everything fed
    /// so far.
    pub fn finalize(self) -> String {
        format!("sha256:{}", hex::encode(self.hasher.finalize()))
    }
}

impl Default for DigestAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot digest of a byte slice.
pub fn digest_of(data: &[u8]) -> String {
    let mut acc = DigestAccumulator::new();
    acc.update(data);
    acc.finalize()
}
