use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::activity::ActivityReceiver;
use crate::participant::ParticipantIdMap;
use crate::sequencer::{coalesce, InboundSequencer};
use crate::session::{Recipient, SessionContext, SessionEvent};
use crate::watchdog::{ChecksumCheck, ConsistencyWatchdog, RecoveryProgress};
use crate::{
    Activity,
    ChecksumActivity,
    ChecksumErrorActivity,
    DocumentBuffers,
    DocumentPath,
    EditActivity,
    Error,
    FileActivity,
    FileChange,
    Jupiter,
    JupiterActivity,
    JupiterTimestamp,
    Operation,
    ParticipantId,
    Purpose,
    RecoveryId,
    Result,
    SessionConfig,
    TextSelectionActivity,
    ViewportActivity,
};

/// Everything a session knows about one document.
///
/// This is the serialization domain of a document: its Jupiter states, its
/// inbound streams, its recoveries and its buffer are only ever touched
/// through a `&mut DocumentState`, which the session's document actor owns.
///
/// On the host there's one Jupiter state per other participant, on every
/// other participant there's a single one, paired with the host.
///
/// Nothing here performs I/O: the activities to send and the events to
/// report accumulate until they're collected with
/// [`take_outbox`](Self::take_outbox) and [`take_events`](Self::take_events).
pub struct DocumentState {
    path: DocumentPath,
    context: Arc<SessionContext>,
    buffers: Arc<dyn DocumentBuffers>,
    config: SessionConfig,

    /// One Jupiter state per peer, created on first use.
    jupiters: ParticipantIdMap<Jupiter>,

    inbound: InboundSequencer,

    watchdog: ConsistencyWatchdog,

    /// Activities stamped with a generation whose recovery file hasn't
    /// arrived yet.
    early: Vec<JupiterActivity>,

    /// The peers whose stalled stream has already been reported, with the
    /// local count they were stuck at.
    stalled: ParticipantIdMap<u32>,

    /// The local activities waiting for the next flush.
    pending: Vec<Activity>,

    outbox: Vec<(Recipient, Activity)>,

    events: Vec<SessionEvent>,
}

impl core::fmt::Debug for DocumentState {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("DocumentState")
            .field("path", &self.path)
            .field("local", &self.context.local())
            .field("jupiters", &self.jupiters)
            .field("pending", &self.pending.len())
            .field("recovering", &self.is_recovering())
            .finish_non_exhaustive()
    }
}

impl DocumentState {
    /// Runs a checksum pass: sends the checksum of the document to every
    /// other participant, stamped with the Jupiter timestamp of its
    /// peer-pair.
    ///
    /// Only the host runs checksum passes; on every other participant this
    /// does nothing.
    pub fn checksum_pass(&mut self) {
        if !self.context.is_host() {
            return;
        }

        self.flush();

        let Some(content) = self.buffers.current_content(&self.path) else {
            warn!(path = %self.path, "no buffer to checksum");
            return;
        };

        for peer in self.context.others() {
            let timestamp = self.jupiter(peer).timestamp();

            let checksum =
                self.watchdog.checksum(self.path.clone(), &content, timestamp);

            self.send(Recipient::Participant(peer), checksum);
        }
    }

    /// Coalesces the local activities accumulated since the last flush and
    /// queues them for sending.
    ///
    /// Edits are stamped by Jupiter here: on the host once for every other
    /// participant, elsewhere once for the host.
    pub fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let pending = core::mem::take(&mut self.pending);

        for activity in coalesce(pending) {
            match activity {
                Activity::Edit(edit) => {
                    let origin = edit.source();
                    let operation = edit.into_operation();
                    self.broadcast_operation(origin, operation, None);
                },
                other => self.outbox.push((Recipient::Broadcast, other)),
            }
        }
    }

    /// Returns `true` if a recovery of the document is in progress.
    #[inline]
    pub fn is_recovering(&self) -> bool {
        self.watchdog.is_recovering(&self.path)
    }

    /// The Jupiter timestamp of the peer-pair with `peer`, if there is one.
    #[inline]
    pub fn jupiter_timestamp(
        &self,
        peer: ParticipantId,
    ) -> Option<JupiterTimestamp> {
        self.jupiters.get(&peer).map(Jupiter::timestamp)
    }

    /// Queues a local selection or viewport change for the next flush.
    pub fn local_awareness(&mut self, activity: Activity) {
        debug_assert!(matches!(
            activity,
            Activity::TextSelection(_) | Activity::Viewport(_)
        ));

        self.pending.push(activity);
    }

    /// Queues a local edit for the next flush.
    ///
    /// The edit must already have been applied to the local buffer. Edits
    /// made while the document is being recovered are discarded, since the
    /// recovery overwrites them anyway.
    ///
    /// An edit made by a participant without write permission is rejected
    /// with [`ReadOnly`](Error::ReadOnly). It's already in the local buffer
    /// though, so the caller should
    /// [`request_recovery`](Self::request_recovery) to get rid of it.
    pub fn local_edit(&mut self, operation: Operation) -> Result<()> {
        let local = self.context.local();

        if !self.context.can_write(local) {
            warn!(path = %self.path, "rejecting edit made while read-only");
            return Err(Error::ReadOnly {
                path: self.path.clone(),
                participant: local,
            });
        }

        if self.is_recovering() {
            debug!(path = %self.path, "discarding edit made during recovery");
            return Ok(());
        }

        if operation.is_no_op() {
            return Ok(());
        }

        let edit = EditActivity::new(local, self.path.clone(), operation);

        self.pending.push(edit.into());

        Ok(())
    }

    /// Creates the state of a document whose buffer is open in `buffers`.
    pub fn new(
        path: DocumentPath,
        context: Arc<SessionContext>,
        buffers: Arc<dyn DocumentBuffers>,
        config: SessionConfig,
    ) -> Self {
        Self {
            inbound: InboundSequencer::new(path.clone()),
            watchdog: ConsistencyWatchdog::new(context.local()),
            path,
            context,
            buffers,
            config,
            jupiters: ParticipantIdMap::default(),
            early: Vec::new(),
            stalled: ParticipantIdMap::default(),
            pending: Vec::new(),
            outbox: Vec::new(),
            events: Vec::new(),
        }
    }

    /// The document's path.
    #[inline]
    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    /// Handles an activity received from the network.
    ///
    /// The activity is expected to have been validated already.
    #[inline]
    pub fn receive(&mut self, activity: &Activity, now: Instant) {
        activity.dispatch(&mut Inbound { state: self, now });
    }

    /// Moves the document to `new_path`.
    pub fn rename(&mut self, new_path: DocumentPath) {
        info!(from = %self.path, to = %new_path, "document moved");

        for jupiter in self.jupiters.values_mut() {
            jupiter.set_path(new_path.clone());
        }

        self.inbound.set_path(new_path.clone());
        self.watchdog.rename(&self.path, &new_path);

        for activity in &mut self.pending {
            if let Activity::Edit(edit) = activity {
                *edit = EditActivity::new(
                    edit.source(),
                    new_path.clone(),
                    edit.operation().clone(),
                );
            }
        }

        // Selections and viewports refer to the old path.
        self.pending.retain(|activity| matches!(activity, Activity::Edit(_)));

        self.path = new_path;
    }

    /// Asks for the authoritative content of the document.
    ///
    /// On the host, where the content is authoritative by definition, this
    /// pushes it to every other participant instead.
    pub fn request_recovery(&mut self, now: Instant) {
        if self.context.is_host() {
            for peer in self.context.others() {
                self.push_recovery(peer);
            }
            return;
        }

        if self.is_recovering() {
            return;
        }

        // Whatever is still pending is about to be overwritten.
        self.pending.clear();

        let error = self.watchdog.start_recovery(
            self.context.host(),
            vec![self.path.clone()],
            now,
        );

        self.recovery_requested(error);
    }

    /// Drains the activities to send.
    #[inline]
    pub fn take_outbox(&mut self) -> Vec<(Recipient, Activity)> {
        core::mem::take(&mut self.outbox)
    }

    /// Drains the events to report.
    #[inline]
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        core::mem::take(&mut self.events)
    }

    /// Looks for stalled inbound streams and abandoned recoveries.
    pub fn tick(&mut self, now: Instant) {
        for error in self.inbound.expired(now, self.config.sequencing_timeout)
        {
            let Error::SequencingTimeout { peer, waiting_for, .. } = error
            else {
                continue;
            };

            if self.stalled.get(&peer) == Some(&waiting_for) {
                continue;
            }

            warn!(path = %self.path, %peer, "{error}");

            self.stalled.insert(peer, waiting_for);

            self.events.push(SessionEvent::PossibleDesync {
                path: self.path.clone(),
                peer,
            });

            if self.config.auto_recover_on_timeout {
                if self.context.is_host() {
                    self.push_recovery(peer);
                } else {
                    self.request_recovery(now);
                }
            }
        }

        let timeout = self.config.recovery_timeout;

        for session in self.watchdog.expire(now, timeout) {
            self.events.push(SessionEvent::RecoveryAbandoned {
                id: session.id(),
            });
        }
    }

    /// Sends `operation` to every peer except `except`, stamping it with
    /// each peer-pair's Jupiter state.
    fn broadcast_operation(
        &mut self,
        origin: ParticipantId,
        operation: Operation,
        except: Option<ParticipantId>,
    ) {
        let peers = if self.context.is_host() {
            self.context.others()
        } else {
            vec![self.context.host()]
        };

        for peer in peers.into_iter().filter(|&peer| Some(peer) != except) {
            let activity =
                self.jupiter(peer).generate(origin, operation.clone());
            self.send(Recipient::Participant(peer), activity);
        }
    }

    /// Transforms and applies a Jupiter activity released by the
    /// sequencer, forwarding it to the other peers on the host.
    fn integrate(
        &mut self,
        sender: ParticipantId,
        activity: &JupiterActivity,
    ) -> Result<()> {
        let operation = self.jupiter(sender).receive(activity)?;

        if operation.is_no_op() {
            return Ok(());
        }

        self.buffers.apply_operation(&self.path, &operation)?;

        self.events.push(SessionEvent::RemoteOperation {
            path: self.path.clone(),
            origin: activity.source(),
            operation: operation.clone(),
        });

        if self.context.is_host() {
            let origin = activity.source();
            self.broadcast_operation(origin, operation, Some(sender));
        }

        Ok(())
    }

    #[inline]
    fn jupiter(&mut self, peer: ParticipantId) -> &mut Jupiter {
        self.jupiters
            .entry(peer)
            .or_insert_with(|| Jupiter::new(self.path.clone(), peer))
    }

    /// Reacts to an error hit while integrating activities from `peer`.
    fn on_error(&mut self, peer: ParticipantId, err: Error, now: Instant) {
        if !err.is_fatal_for_document() {
            warn!(path = %self.path, %peer, "{err}");
            self.events.push(SessionEvent::ActivityDropped {
                from: peer,
                reason: err.to_string(),
            });
            return;
        }

        error!(path = %self.path, %peer, "{err}, resynchronizing");

        if self.context.is_host() {
            self.push_recovery(peer);
        } else {
            self.request_recovery(now);
        }
    }

    /// Host only: sends the document's content to `peer`, and restarts the
    /// peer-pair from scratch.
    fn push_recovery(&mut self, peer: ParticipantId) {
        // Edits made so far are part of the content being sent.
        self.flush();

        let Some(content) = self.buffers.current_content(&self.path) else {
            warn!(path = %self.path, %peer, "no buffer to recover from");
            return;
        };

        let id = RecoveryId::new();

        info!(path = %self.path, %peer, recovery = %id, "pushing recovery");

        let generation = self.reset_peer(peer);

        let file = FileActivity::recovery(
            self.context.local(),
            self.path.clone(),
            content,
            id,
        )
        .with_generation(generation);

        self.send(Recipient::Participant(peer), file);
    }

    fn recovery_requested(&mut self, error: ChecksumErrorActivity) {
        self.events.push(SessionEvent::RecoveryStarted {
            id: error.recovery_id(),
            paths: error.paths().to_vec(),
        });

        self.send(Recipient::Participant(error.target()), error);
    }

    /// Forgets the Jupiter state and the inbound stream shared with `peer`,
    /// returning the generation the peer-pair restarts from.
    #[inline]
    fn reset_peer(&mut self, peer: ParticipantId) -> u32 {
        let jupiter = self.jupiter(peer);
        jupiter.reset();
        let generation = jupiter.generation();
        self.inbound.reset(peer);
        self.stalled.remove(&peer);
        generation
    }

    #[inline]
    fn send(&mut self, recipient: Recipient, activity: impl Into<Activity>) {
        self.outbox.push((recipient, activity.into()));
    }
}

/// Routes the inbound activities of a document to the right handler.
struct Inbound<'a> {
    state: &'a mut DocumentState,
    now: Instant,
}

impl ActivityReceiver for Inbound<'_> {
    fn receive_jupiter(&mut self, activity: &JupiterActivity) {
        let state = &mut *self.state;
        let context = Arc::clone(&state.context);

        // On the host the sender is the originating peer, elsewhere every
        // operation is relayed by the host.
        let sender = if context.is_host() {
            activity.source()
        } else {
            context.host()
        };

        let theirs = activity.timestamp().generation();
        let ours = state.jupiter(sender).generation();

        if theirs < ours || (theirs > ours && context.is_host()) {
            debug!(
                path = %state.path,
                peer = %sender,
                stamp = ?activity.timestamp(),
                generation = ours,
                "dropping operation of another generation"
            );
            return;
        }

        if theirs > ours {
            // The host restarted the peer-pair, and the recovery file is
            // still on its way.
            debug!(
                path = %state.path,
                stamp = ?activity.timestamp(),
                "holding operation until its recovery arrives"
            );
            state.early.push(activity.clone());
            return;
        }

        if context.is_host() && !context.can_write(sender) {
            warn!(
                path = %state.path,
                peer = %sender,
                "dropping edit of a read-only participant"
            );
            state.events.push(SessionEvent::ActivityDropped {
                from: sender,
                reason: "participant is read-only".to_owned(),
            });
            // The edit is in the sender's buffer and nowhere else.
            state.push_recovery(sender);
            return;
        }

        if state.is_recovering() {
            debug!(path = %state.path, "ignoring operation during recovery");
            return;
        }

        // Local edits that haven't been stamped yet must be known to Jupiter
        // before remote ones can be transformed against them.
        state.flush();

        let released = state
            .inbound
            .push(sender, activity.clone(), self.now)
            .collect::<Vec<_>>();

        if state.inbound.buffered(sender) == 0 {
            state.stalled.remove(&sender);
        }

        for activity in released {
            if let Err(err) = state.integrate(sender, &activity) {
                state.on_error(sender, err, self.now);
                break;
            }
        }
    }

    fn receive_text_selection(&mut self, activity: &TextSelectionActivity) {
        self.state.events.push(SessionEvent::Selection(activity.clone()));
    }

    fn receive_viewport(&mut self, activity: &ViewportActivity) {
        self.state.events.push(SessionEvent::Viewport(activity.clone()));
    }

    fn receive_file(&mut self, activity: &FileActivity) {
        let state = &mut *self.state;

        let Some(content) = activity.content() else {
            // Moves and removals are the session's business.
            return;
        };

        if activity.purpose() == Purpose::Recovery && state.context.is_host() {
            warn!(
                path = %state.path,
                from = %activity.source(),
                "ignoring recovery file sent to the host"
            );
            return;
        }

        debug_assert_eq!(activity.change(), FileChange::Created);

        state.buffers.replace_content(&state.path, content.to_owned());

        state.pending.clear();
        state.inbound.clear();
        state.stalled.clear();

        match activity.purpose() {
            Purpose::Recovery => {
                let generation = activity.generation();

                let host = state.context.host();
                state.jupiter(host).reset_to(generation);

                let id = match state.watchdog.accept_recovery(activity) {
                    RecoveryProgress::Completed(id)
                    | RecoveryProgress::Pending(id) => Some(id),
                    RecoveryProgress::Unsolicited => activity.recovery_id(),
                };

                info!(
                    path = %state.path,
                    recovery = ?id,
                    generation,
                    "recovered"
                );

                state.events.push(SessionEvent::RecoveryCompleted {
                    path: state.path.clone(),
                    id,
                });

                let early = core::mem::take(&mut state.early);

                for activity in early {
                    self.receive_jupiter(&activity);
                }
            },

            Purpose::Activity => {
                for jupiter in state.jupiters.values_mut() {
                    jupiter.reset_to(jupiter.generation());
                }

                state.events.push(SessionEvent::ContentReplaced {
                    path: state.path.clone(),
                });
            },
        }
    }

    fn receive_checksum(&mut self, activity: &ChecksumActivity) {
        let state = &mut *self.state;

        if state.context.is_host() {
            warn!(path = %state.path, "ignoring checksum sent to the host");
            return;
        }

        // Flushing makes pending edits count as in flight.
        state.flush();

        let host = state.context.host();
        let in_sync =
            state.jupiter(host).is_in_sync_with(activity.timestamp());

        let content =
            state.buffers.current_content(&state.path).unwrap_or_default();

        match state.watchdog.check(activity, &content, in_sync, self.now) {
            ChecksumCheck::Mismatch(error) => {
                state.pending.clear();
                state.recovery_requested(error);
            },
            ChecksumCheck::Match
            | ChecksumCheck::Stale
            | ChecksumCheck::Recovering => {},
        }
    }

    fn receive_checksum_error(&mut self, activity: &ChecksumErrorActivity) {
        let state = &mut *self.state;

        if !state.context.is_host() {
            warn!(path = %state.path, "ignoring misdirected checksum error");
            return;
        }

        let peer = activity.source();

        // In-flight edits must reach the peer before the content does.
        state.flush();

        let buffers = Arc::clone(&state.buffers);
        let path = state.path.clone();

        let files = state.watchdog.answer(activity, |requested| {
            (*requested == path)
                .then(|| buffers.current_content(requested))
                .flatten()
        });

        if files.is_empty() {
            return;
        }

        info!(
            path = %state.path,
            %peer,
            recovery = %activity.recovery_id(),
            "answering recovery"
        );

        let generation = state.reset_peer(peer);

        for file in files {
            let file = file.with_generation(generation);
            state.send(Recipient::Participant(peer), file);
        }
    }
}
