use std::collections::BTreeMap;

use tokio::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::{DocumentPath, Error, JupiterActivity, ParticipantId};
use crate::participant::ParticipantIdMap;

/// Puts the Jupiter activities of one document back into the order they
/// were generated in.
///
/// Every peer sends its activities for a document with increasing local
/// counts, starting from zero. The transport may reorder them, so an
/// activity whose predecessor hasn't arrived yet is buffered until it does.
/// Activities are released strictly in order, one local count at a time.
#[derive(Debug, Clone)]
pub struct InboundSequencer {
    path: DocumentPath,
    streams: ParticipantIdMap<Stream>,
}

#[derive(Debug, Clone, Default)]
struct Stream {
    /// The local count of the next activity to deliver.
    next: u32,

    /// The activities that arrived before their predecessors, keyed by
    /// their local count, together with the time they arrived.
    buffered: BTreeMap<u32, (JupiterActivity, Instant)>,
}

impl InboundSequencer {
    /// Returns the number of activities from `peer` waiting for a
    /// predecessor.
    #[inline]
    pub fn buffered(&self, peer: ParticipantId) -> usize {
        self.streams.get(&peer).map_or(0, |stream| stream.buffered.len())
    }

    /// Drops every stream.
    #[inline]
    pub fn clear(&mut self) {
        self.streams.clear();
    }

    /// Returns a [`SequencingTimeout`](Error::SequencingTimeout) for every
    /// stream that has had an activity buffered for longer than `timeout`.
    pub fn expired(&self, now: Instant, timeout: Duration) -> Vec<Error> {
        self.streams
            .iter()
            .filter_map(|(&peer, stream)| {
                let oldest =
                    stream.buffered.values().map(|&(_, at)| at).min()?;

                (now.saturating_duration_since(oldest) >= timeout).then(|| {
                    Error::SequencingTimeout {
                        path: self.path.clone(),
                        peer,
                        waiting_for: stream.next,
                        buffered: stream.buffered.len(),
                    }
                })
            })
            .collect()
    }

    /// Creates a new sequencer for the given document.
    #[inline]
    pub fn new(path: DocumentPath) -> Self {
        Self { path, streams: ParticipantIdMap::default() }
    }

    /// Feeds an activity received from `peer` to the sequencer, returning
    /// the activities that can now be delivered, in order.
    ///
    /// Activities that were already delivered are dropped.
    pub fn push(
        &mut self,
        peer: ParticipantId,
        activity: JupiterActivity,
        now: Instant,
    ) -> Released<'_> {
        let stream = self.streams.entry(peer).or_default();

        let local = activity.timestamp().local();

        if local < stream.next {
            warn!(
                path = %self.path,
                %peer,
                local,
                watermark = stream.next,
                "dropping an activity that was already delivered"
            );
        } else if stream.buffered.insert(local, (activity, now)).is_some() {
            warn!(
                path = %self.path,
                %peer,
                local,
                "replaced a duplicate buffered activity"
            );
        } else if local > stream.next {
            debug!(
                path = %self.path,
                %peer,
                local,
                waiting_for = stream.next,
                "buffering out of order activity"
            );
        }

        Released { stream }
    }

    /// Forgets everything about the stream from `peer`, so that the next
    /// activity delivered from it is the one with local count zero.
    #[inline]
    pub fn reset(&mut self, peer: ParticipantId) {
        if let Some(stream) = self.streams.remove(&peer) {
            if !stream.buffered.is_empty() {
                debug!(
                    path = %self.path,
                    %peer,
                    discarded = stream.buffered.len(),
                    "reset stream with buffered activities"
                );
            }
        }
    }

    /// Renames the document the sequencer is for.
    #[inline]
    pub(crate) fn set_path(&mut self, path: DocumentPath) {
        self.path = path;
    }

    /// The local count of the next activity to be delivered from `peer`.
    #[inline]
    pub fn watermark(&self, peer: ParticipantId) -> u32 {
        self.streams.get(&peer).map_or(0, |stream| stream.next)
    }
}

/// An iterator over the activities that are ready to be delivered.
///
/// This struct is created by the [`push`](InboundSequencer::push) method on
/// [`InboundSequencer`]. Activities that aren't consumed stay buffered and
/// are released by the next call to `push`.
pub struct Released<'a> {
    stream: &'a mut Stream,
}

impl Iterator for Released<'_> {
    type Item = JupiterActivity;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let (activity, _) = self.stream.buffered.remove(&self.stream.next)?;
        self.stream.next += 1;
        Some(activity)
    }
}
