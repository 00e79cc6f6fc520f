use std::collections::VecDeque;

use tracing::{debug, trace, warn};

use crate::transform::transform;
use crate::{
    DocumentPath,
    Error,
    JupiterActivity,
    JupiterTimestamp,
    Operation,
    OperationError,
    ParticipantId,
    Result,
};

/// How many unacknowledged operations we tolerate before logging that the
/// peer seems to be falling behind.
const OUTSTANDING_WARN_THRESHOLD: usize = 64;

/// The two states of a [`Jupiter`] engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JupiterState {
    /// Every operation we generated has been acknowledged by the peer.
    Idle,

    /// Some of the operations we generated haven't been acknowledged yet.
    AwaitingAck,
}

/// The operational-transformation state machine of one side of a
/// (document, peer-pair).
///
/// Local operations go through [`generate`](Self::generate), which stamps
/// them and keeps them in the outstanding queue until the peer acknowledges
/// them. Remote operations go through [`receive`](Self::receive), which
/// transforms them against the outstanding operations the peer hadn't seen
/// when it generated them.
///
/// ```text
///   local ops ─▶ generate ─▶ (stamped) ─▶ peer
///                   │
///            outstanding queue
///                   │
///   peer ─▶ (stamped) ─▶ receive ─▶ transformed op ─▶ buffer
/// ```
#[derive(Clone)]
pub struct Jupiter {
    path: DocumentPath,

    /// The other side of the peer-pair.
    peer: ParticipantId,

    timestamp: JupiterTimestamp,

    /// The highest number of our operations the peer has acknowledged.
    acknowledged: u32,

    /// The operations we've sent but the peer hasn't acknowledged yet, in
    /// the order they were generated.
    outstanding: VecDeque<Outstanding>,
}

#[derive(Clone, Debug)]
struct Outstanding {
    /// Our local count at the time the operation was generated.
    local: u32,

    /// The participant the operation originates from.
    origin: ParticipantId,

    /// The operation, transformed against every remote operation received
    /// since it was generated.
    operation: Operation,
}

impl core::fmt::Debug for Jupiter {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Jupiter")
            .field("path", &self.path)
            .field("peer", &self.peer)
            .field("timestamp", &self.timestamp)
            .field("outstanding", &self.outstanding.len())
            .finish()
    }
}

impl Jupiter {
    /// Stamps a local operation for the peer and queues it until it's
    /// acknowledged.
    ///
    /// `origin` is the participant the operation comes from: the local
    /// participant for local edits, or the original author when the host
    /// forwards another client's operation.
    pub fn generate(
        &mut self,
        origin: ParticipantId,
        operation: Operation,
    ) -> JupiterActivity {
        let timestamp = self.timestamp.increment_local();

        self.outstanding.push_back(Outstanding {
            local: timestamp.local(),
            origin,
            operation: operation.clone(),
        });

        if self.outstanding.len() == OUTSTANDING_WARN_THRESHOLD {
            warn!(
                path = %self.path,
                peer = %self.peer,
                "{} operations are waiting to be acknowledged, the peer \
                 might have trouble catching up",
                OUTSTANDING_WARN_THRESHOLD
            );
        }

        trace!(path = %self.path, peer = %self.peer, ?timestamp, "generated");

        JupiterActivity::new(origin, self.path.clone(), timestamp, operation)
    }

    /// Returns `true` if the peer is known to have exactly the same view of
    /// the document as we do, given the peer's timestamp `theirs`.
    #[inline]
    pub fn is_in_sync_with(&self, theirs: JupiterTimestamp) -> bool {
        self.timestamp == theirs.mirrored()
    }

    /// Creates a new engine for the given document and peer, starting from
    /// the `(0, 0)` baseline.
    #[inline]
    pub fn new(path: DocumentPath, peer: ParticipantId) -> Self {
        Self {
            path,
            peer,
            timestamp: JupiterTimestamp::default(),
            acknowledged: 0,
            outstanding: VecDeque::new(),
        }
    }

    /// The number of operations waiting to be acknowledged.
    #[inline]
    pub fn outstanding_len(&self) -> usize {
        self.outstanding.len()
    }

    /// The other side of the peer-pair.
    #[inline]
    pub fn peer(&self) -> ParticipantId {
        self.peer
    }

    /// Transforms a remote operation so that it can be applied to the local
    /// document.
    ///
    /// The operations of the outstanding queue the peer had already seen
    /// are discarded; the remaining ones are transformed against the remote
    /// operation in turn, so that they stay valid for the operations the
    /// peer will send next.
    ///
    /// A timestamp that's inconsistent with the history of this peer-pair,
    /// including one from another generation, is a
    /// [`CausalityViolation`](Error::CausalityViolation), after which the
    /// only way forward is to [`reset`](Self::reset) both sides.
    pub fn receive(
        &mut self,
        activity: &JupiterActivity,
    ) -> Result<Operation> {
        let theirs = activity.timestamp();

        if theirs.generation() != self.timestamp.generation()
            || theirs.remote() > self.timestamp.local()
            || theirs.remote() < self.acknowledged
            || theirs.local() != self.timestamp.remote()
        {
            return Err(Error::CausalityViolation {
                path: self.path.clone(),
                peer: self.peer,
                received: theirs,
                local: self.timestamp,
            });
        }

        self.acknowledge(theirs.remote());

        let remote_origin = activity.source();

        let mut remote_op = activity.operation().clone();

        let mut transformed = Vec::with_capacity(self.outstanding.len());

        for entry in &self.outstanding {
            let remote_first = remote_origin.wins_tie_against(entry.origin);

            let local_op =
                transform(&entry.operation, &remote_op, !remote_first)
                    .map_err(|source| self.transform_error(source))?;

            remote_op = transform(&remote_op, &entry.operation, remote_first)
                .map_err(|source| self.transform_error(source))?;

            transformed.push(local_op);
        }

        for (entry, operation) in
            self.outstanding.iter_mut().zip(transformed)
        {
            entry.operation = operation;
        }

        self.timestamp.increment_remote();

        trace!(
            path = %self.path,
            peer = %self.peer,
            timestamp = ?self.timestamp,
            "received"
        );

        Ok(remote_op)
    }

    /// The number of times the peer-pair was reset.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.timestamp.generation()
    }

    /// Drops every outstanding operation and goes back to the `(0, 0)`
    /// baseline of the next generation.
    ///
    /// This is what the host does when it sends a recovery; the peer follows
    /// with [`reset_to`](Self::reset_to) once the recovery arrives.
    #[inline]
    pub fn reset(&mut self) {
        self.reset_to(self.generation().wrapping_add(1));
    }

    /// Drops every outstanding operation and goes back to the `(0, 0)`
    /// baseline of `generation`.
    pub fn reset_to(&mut self, generation: u32) {
        if !self.outstanding.is_empty() {
            debug!(
                path = %self.path,
                peer = %self.peer,
                discarded = self.outstanding.len(),
                "resetting with unacknowledged operations"
            );
        }

        self.timestamp = JupiterTimestamp::baseline(generation);
        self.acknowledged = 0;
        self.outstanding.clear();
    }

    #[inline]
    pub(crate) fn set_path(&mut self, path: DocumentPath) {
        self.path = path;
    }

    /// The current state.
    #[inline]
    pub fn state(&self) -> JupiterState {
        if self.outstanding.is_empty() {
            JupiterState::Idle
        } else {
            JupiterState::AwaitingAck
        }
    }

    /// The current timestamp.
    #[inline]
    pub fn timestamp(&self) -> JupiterTimestamp {
        self.timestamp
    }

    #[inline]
    fn acknowledge(&mut self, up_to: u32) {
        let before = self.outstanding.len();

        while self.outstanding.front().is_some_and(|op| op.local < up_to) {
            self.outstanding.pop_front();
        }

        self.acknowledged = up_to;

        if before != self.outstanding.len() {
            trace!(
                path = %self.path,
                peer = %self.peer,
                acknowledged = before - self.outstanding.len(),
                still_outstanding = self.outstanding.len(),
                "acknowledged"
            );
        }
    }

    #[inline]
    fn transform_error(&self, source: OperationError) -> Error {
        Error::OperationTransform { path: self.path.clone(), source }
    }
}
