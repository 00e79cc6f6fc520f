use crate::{
    DocumentPath,
    FolderActivity,
    Operation,
    ParticipantId,
    Permission,
    RecoveryId,
    TextSelectionActivity,
    ViewportActivity,
};

/// What a [`Session`](crate::Session) reports to the editor integration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A remote operation was applied to the buffer of `path`.
    RemoteOperation {
        /// The document.
        path: DocumentPath,
        /// The participant the operation originates from.
        origin: ParticipantId,
        /// The operation, transformed against the local history.
        operation: Operation,
    },

    /// The content of `path` was replaced wholesale, either by a recovery
    /// or by a remote file creation.
    ContentReplaced {
        /// The document.
        path: DocumentPath,
    },

    /// A document was removed.
    DocumentRemoved {
        /// The document.
        path: DocumentPath,
    },

    /// A document was moved.
    DocumentMoved {
        /// The previous path.
        from: DocumentPath,
        /// The new path.
        to: DocumentPath,
    },

    /// The stream of operations from `peer` stalled: a predecessor never
    /// arrived.
    PossibleDesync {
        /// The document.
        path: DocumentPath,
        /// The sender of the stalled stream.
        peer: ParticipantId,
    },

    /// A recovery of `paths` was requested.
    RecoveryStarted {
        /// The recovery's id.
        id: RecoveryId,
        /// The documents being recovered.
        paths: Vec<DocumentPath>,
    },

    /// The content of `path` was replaced by the host's authoritative one.
    RecoveryCompleted {
        /// The document.
        path: DocumentPath,
        /// The recovery's id, if it answered a request.
        id: Option<RecoveryId>,
    },

    /// A recovery was abandoned because its files never arrived.
    RecoveryAbandoned {
        /// The recovery's id.
        id: RecoveryId,
    },

    /// An inbound activity was dropped without being applied.
    ActivityDropped {
        /// The participant that sent it.
        from: ParticipantId,
        /// Why it was dropped.
        reason: String,
    },

    /// A peer moved its selection.
    Selection(TextSelectionActivity),

    /// A peer scrolled.
    Viewport(ViewportActivity),

    /// A folder was created or removed.
    FolderChanged(FolderActivity),

    /// A participant's permission changed.
    PermissionChanged {
        /// The participant.
        participant: ParticipantId,
        /// Its new permission.
        permission: Permission,
    },
}
