use crate::{DocumentPath, JupiterTimestamp, ParticipantId, TextPosition};

/// The crate's result type.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// The kinds of failure this layer reports upward.
///
/// Nothing in this crate panics across its public interface: every failure
/// ends up as one of these variants, and the document actors decide whether
/// it's enough to drop the offending activity or whether the document has
/// to be resynchronized (see [`is_fatal_for_document`]).
///
/// [`is_fatal_for_document`]: Error::is_fatal_for_document
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An activity failed its validity check, usually because it was
    /// deserialized from the wire without going through its constructor.
    #[error("malformed activity from {source_id}: {reason}")]
    MalformedActivity {
        /// Who sent it.
        source_id: ParticipantId,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// An operation couldn't be transformed or applied.
    #[error("operation transform failed on {path}: {source}")]
    OperationTransform {
        /// The document the operation targeted.
        path: DocumentPath,
        /// The underlying algebraic failure.
        #[source]
        source: OperationError,
    },

    /// A timestamp received from a peer is inconsistent with the local
    /// history of that peer-pair.
    #[error(
        "causality violation on {path} with {peer}: received {received:?}, \
         local state is {local:?}"
    )]
    CausalityViolation {
        /// The document.
        path: DocumentPath,
        /// The other side of the peer-pair.
        peer: ParticipantId,
        /// The timestamp carried by the offending activity.
        received: JupiterTimestamp,
        /// The local timestamp of the peer-pair.
        local: JupiterTimestamp,
    },

    /// A predecessor in an inbound stream didn't arrive in time.
    #[error(
        "sequencing timeout on {path} from {peer}: still waiting for \
         operation #{waiting_for} with {buffered} buffered behind it"
    )]
    SequencingTimeout {
        /// The document.
        path: DocumentPath,
        /// The sender of the stream.
        peer: ParticipantId,
        /// The local count of the missing activity.
        waiting_for: u32,
        /// How many activities are stuck behind it.
        buffered: usize,
    },

    /// The local participant edited a document without write permission.
    ///
    /// The edit isn't sent to anyone, and the document is recovered from
    /// the host to undo it.
    #[error("{participant} can't edit {path}: read-only participant")]
    ReadOnly {
        /// The document.
        path: DocumentPath,
        /// The local participant.
        participant: ParticipantId,
    },

    /// The document buffer collaborator failed.
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// No document is registered under the given path.
    #[error("unknown document {0}")]
    UnknownDocument(DocumentPath),

    /// The session has been left.
    #[error("the session has been closed")]
    SessionClosed,
}

impl Error {
    /// Returns `true` if this error leaves the document in a state that can
    /// only be repaired by a full-content recovery.
    #[inline]
    pub fn is_fatal_for_document(&self) -> bool {
        matches!(
            self,
            Self::OperationTransform { .. }
                | Self::CausalityViolation { .. }
                | Self::SequencingTimeout { .. }
                | Self::Buffer(_)
        )
    }
}

/// The type of error that can occur when transforming or applying an
/// [`Operation`](crate::Operation).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    /// The precomputed extent of an operation doesn't match its text.
    #[error("the extent of the operation at {at:?} doesn't match its text")]
    DeltaMismatch {
        /// Where the operation starts.
        at: TextPosition,
    },

    /// An insertion or deletion with an empty text.
    #[error("empty text in a non-NoOp operation at {at:?}")]
    EmptyText {
        /// Where the operation starts.
        at: TextPosition,
    },

    /// A position lies outside of the text it refers to.
    #[error("position {at:?} is out of bounds")]
    OutOfBounds {
        /// The offending position.
        at: TextPosition,
    },

    /// A deletion's text doesn't match the text found in the document.
    #[error("deleted text doesn't match the document at {at:?}")]
    TextMismatch {
        /// Where the deletion starts.
        at: TextPosition,
    },

    /// The transformation produced a range with a negative length.
    #[error("negative length range between {start:?} and {end:?}")]
    NegativeLength {
        /// The start of the range.
        start: TextPosition,
        /// The end of the range.
        end: TextPosition,
    },
}

/// The type of error the [`DocumentBuffers`](crate::DocumentBuffers)
/// collaborator can return.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// No buffer is open for the path.
    #[error("no buffer open for {0}")]
    NotOpen(DocumentPath),

    /// The operation couldn't be applied to the buffer's content.
    #[error("couldn't apply operation to {path}: {source}")]
    Apply {
        /// The document.
        path: DocumentPath,
        /// Why the operation didn't apply.
        #[source]
        source: OperationError,
    },
}
