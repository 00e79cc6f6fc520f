use sha2::{Digest, Sha256};

/// A compact fingerprint of a document's content: its length in bytes plus
/// the first 8 bytes of the SHA-256 digest of its UTF-8 encoding.
///
/// Two replicas whose checksums differ have certainly diverged. Two replicas
/// whose checksums match have almost certainly converged.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DocumentChecksum {
    length: u64,
    hash: u64,
}

impl core::fmt::Debug for DocumentChecksum {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "DocumentChecksum({}, {:016x})", self.length, self.hash)
    }
}

impl DocumentChecksum {
    /// Computes the checksum of `content`.
    #[inline]
    pub fn of(content: &str) -> Self {
        let digest = Sha256::digest(content.as_bytes());
        let mut prefix = [0; 8];
        prefix.copy_from_slice(&digest[..8]);
        Self { length: content.len() as u64, hash: u64::from_be_bytes(prefix) }
    }

    /// The truncated digest.
    #[inline]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// The length of the content in bytes.
    #[inline]
    pub fn length(&self) -> u64 {
        self.length
    }
}
