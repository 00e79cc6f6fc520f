use uuid::Uuid;

use crate::{DocumentChecksum, DocumentPath, JupiterTimestamp, ParticipantId};

/// Identifies one attempt at recovering from a divergence.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RecoveryId(Uuid);

impl core::fmt::Debug for RecoveryId {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "RecoveryId({})", self.0.simple())
    }
}

impl core::fmt::Display for RecoveryId {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl RecoveryId {
    /// Returns a fresh, random id.
    #[inline]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecoveryId {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RecoveryId {
    #[inline]
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// The host's checksum of a document, sent to one peer.
///
/// The checksum is stamped with the host's Jupiter timestamp for the
/// receiving peer, so that the peer can tell whether the two replicas are
/// supposed to be identical at this point, or whether some operations are
/// still in flight and the comparison would be meaningless.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChecksumActivity {
    source: ParticipantId,
    path: DocumentPath,
    checksum: DocumentChecksum,
    timestamp: JupiterTimestamp,
}

impl ChecksumActivity {
    /// Creates a new checksum activity.
    #[inline]
    pub fn new(
        source: ParticipantId,
        path: DocumentPath,
        checksum: DocumentChecksum,
        timestamp: JupiterTimestamp,
    ) -> Self {
        Self { source, path, checksum, timestamp }
    }

    /// The host's checksum.
    #[inline]
    pub fn checksum(&self) -> DocumentChecksum {
        self.checksum
    }

    /// The document.
    #[inline]
    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    /// The host.
    #[inline]
    pub fn source(&self) -> ParticipantId {
        self.source
    }

    /// The host's timestamp for the receiving peer when the checksum was
    /// computed.
    #[inline]
    pub fn timestamp(&self) -> JupiterTimestamp {
        self.timestamp
    }

    #[inline]
    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if self.path.is_valid() {
            Ok(())
        } else {
            Err("invalid document path")
        }
    }
}

/// A peer's report that some of its documents don't match the host's, and
/// its request to receive their authoritative content.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChecksumErrorActivity {
    source: ParticipantId,
    target: ParticipantId,
    paths: Vec<DocumentPath>,
    recovery_id: RecoveryId,
}

impl ChecksumErrorActivity {
    /// Creates a new checksum error activity.
    #[inline]
    pub fn new(
        source: ParticipantId,
        target: ParticipantId,
        paths: Vec<DocumentPath>,
        recovery_id: RecoveryId,
    ) -> Self {
        Self { source, target, paths, recovery_id }
    }

    /// The documents to recover.
    #[inline]
    pub fn paths(&self) -> &[DocumentPath] {
        &self.paths
    }

    /// The id of this recovery attempt.
    #[inline]
    pub fn recovery_id(&self) -> RecoveryId {
        self.recovery_id
    }

    /// The peer that detected the divergence.
    #[inline]
    pub fn source(&self) -> ParticipantId {
        self.source
    }

    /// The host.
    #[inline]
    pub fn target(&self) -> ParticipantId {
        self.target
    }

    #[inline]
    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if self.paths.is_empty() {
            return Err("checksum error without paths");
        }
        if !self.paths.iter().all(DocumentPath::is_valid) {
            return Err("invalid document path");
        }
        if self.source == self.target {
            return Err("checksum error addressed to its own source");
        }
        Ok(())
    }
}
