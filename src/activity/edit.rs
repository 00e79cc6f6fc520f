use crate::{DocumentPath, JupiterTimestamp, Operation, ParticipantId};

/// A local edit of a document, not yet stamped by Jupiter.
///
/// This is what the editor integration produces and what the outbound
/// [coalescing](crate::coalesce) works on. It never leaves the local site:
/// before transmission it's turned into a [`JupiterActivity`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EditActivity {
    source: ParticipantId,
    path: DocumentPath,
    operation: Operation,
}

impl EditActivity {
    /// Creates a new edit activity.
    #[inline]
    pub fn new(
        source: ParticipantId,
        path: DocumentPath,
        operation: Operation,
    ) -> Self {
        Self { source, path, operation }
    }

    /// Consumes the activity, returning its operation.
    #[inline]
    pub fn into_operation(self) -> Operation {
        self.operation
    }

    /// The edit.
    #[inline]
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// The edited document.
    #[inline]
    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    /// Who made the edit.
    #[inline]
    pub fn source(&self) -> ParticipantId {
        self.source
    }

    #[inline]
    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if !self.path.is_valid() {
            return Err("invalid document path");
        }
        self.operation.validate().map_err(|_| "malformed operation")
    }
}

/// An operation stamped with the Jupiter timestamp of the peer-pair it's
/// travelling on.
///
/// `source` is the participant the operation *originates* from, which is
/// not necessarily the sender: the host of a session forwards the
/// operations of every client to all the other clients.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JupiterActivity {
    source: ParticipantId,
    path: DocumentPath,
    timestamp: JupiterTimestamp,
    operation: Operation,
}

impl JupiterActivity {
    #[inline]
    pub(crate) fn new(
        source: ParticipantId,
        path: DocumentPath,
        timestamp: JupiterTimestamp,
        operation: Operation,
    ) -> Self {
        Self { source, path, timestamp, operation }
    }

    /// The stamped operation.
    #[inline]
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// The document the operation applies to.
    #[inline]
    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    /// The participant the operation originates from.
    #[inline]
    pub fn source(&self) -> ParticipantId {
        self.source
    }

    /// The sender's timestamp at the time the operation was generated.
    #[inline]
    pub fn timestamp(&self) -> JupiterTimestamp {
        self.timestamp
    }

    #[inline]
    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if !self.path.is_valid() {
            return Err("invalid document path");
        }
        self.operation.validate().map_err(|_| "malformed operation")
    }
}
