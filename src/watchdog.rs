use std::collections::{BTreeSet, HashMap};

use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::{
    ChecksumActivity,
    ChecksumErrorActivity,
    DocumentChecksum,
    DocumentPath,
    FileActivity,
    JupiterTimestamp,
    ParticipantId,
    Purpose,
    RecoveryId,
};

/// One attempt at recovering some documents from a divergence.
///
/// A session is opened when a checksum mismatch is detected and closed once
/// every one of its paths has received its recovery file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoverySession {
    id: RecoveryId,
    initiator: ParticipantId,
    awaiting: BTreeSet<DocumentPath>,
    started_at: Instant,
}

impl RecoverySession {
    /// The paths that are still waiting for their recovery file.
    #[inline]
    pub fn awaiting(&self) -> impl ExactSizeIterator<Item = &DocumentPath> {
        self.awaiting.iter()
    }

    /// The session's id.
    #[inline]
    pub fn id(&self) -> RecoveryId {
        self.id
    }

    /// The participant that detected the divergence.
    #[inline]
    pub fn initiator(&self) -> ParticipantId {
        self.initiator
    }

    /// When the session was opened.
    #[inline]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}

/// The result of comparing the host's checksum with the local content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumCheck {
    /// The checksum matches.
    Match,

    /// Operations are still in flight between the two replicas, so their
    /// contents aren't expected to be equal yet.
    Stale,

    /// The document is already being recovered.
    Recovering,

    /// The checksum doesn't match: the contained activity has to be sent to
    /// the host to request the authoritative content.
    Mismatch(ChecksumErrorActivity),
}

/// What happened when a recovery file was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryProgress {
    /// The file answered a session that still waits for other paths.
    Pending(RecoveryId),

    /// The file resolved the last path of its session, which is now closed.
    Completed(RecoveryId),

    /// The file doesn't answer any session opened here, which happens when
    /// the host pushes a recovery on its own.
    Unsolicited,
}

/// Detects divergences between replicas and keeps track of the recoveries
/// in progress.
///
/// The host uses [`checksum`](Self::checksum) and
/// [`answer`](Self::answer); the other participants use
/// [`check`](Self::check), [`start_recovery`](Self::start_recovery) and
/// [`accept_recovery`](Self::accept_recovery).
#[derive(Debug, Clone)]
pub struct ConsistencyWatchdog {
    local: ParticipantId,
    sessions: HashMap<RecoveryId, RecoverySession>,
}

impl ConsistencyWatchdog {
    /// Accepts a recovery file, closing the session it answers once every
    /// path of that session has been resolved.
    ///
    /// The caller is responsible for replacing the content of the file's
    /// path and for resetting the document's Jupiter state.
    pub fn accept_recovery(
        &mut self,
        file: &FileActivity,
    ) -> RecoveryProgress {
        debug_assert_eq!(file.purpose(), Purpose::Recovery);

        let Some(id) = file.recovery_id() else {
            return RecoveryProgress::Unsolicited;
        };

        let Some(session) = self.sessions.get_mut(&id) else {
            // The file still replaces the content, but a session for its
            // path opened under another id stays open.
            if let Some(other) = self.session_for(file.path()) {
                debug!(
                    path = %file.path(),
                    recovery = %id,
                    open = %other.id,
                    "recovery file for another session"
                );
            }
            return RecoveryProgress::Unsolicited;
        };

        if !session.awaiting.remove(file.path()) {
            warn!(
                path = %file.path(),
                recovery = %id,
                "recovery file for a path the session didn't ask for"
            );
        }

        if session.awaiting.is_empty() {
            self.sessions.remove(&id);
            info!(recovery = %id, "recovery completed");
            RecoveryProgress::Completed(id)
        } else {
            RecoveryProgress::Pending(id)
        }
    }

    /// Answers a checksum error with one recovery file per requested path,
    /// using `content` to read the authoritative content of each document.
    ///
    /// Paths `content` knows nothing about are skipped.
    pub fn answer<F>(
        &self,
        error: &ChecksumErrorActivity,
        mut content: F,
    ) -> Vec<FileActivity>
    where
        F: FnMut(&DocumentPath) -> Option<String>,
    {
        error
            .paths()
            .iter()
            .filter_map(|path| match content(path) {
                Some(content) => Some(FileActivity::recovery(
                    self.local,
                    path.clone(),
                    content,
                    error.recovery_id(),
                )),
                None => {
                    warn!(
                        %path,
                        recovery = %error.recovery_id(),
                        "can't recover unknown document"
                    );
                    None
                },
            })
            .collect()
    }

    /// Compares the host's checksum of a document with the local content.
    ///
    /// `in_sync` tells whether the local Jupiter state mirrors the
    /// timestamp the checksum was stamped with. A mismatch opens a new
    /// recovery session for the document.
    pub fn check(
        &mut self,
        activity: &ChecksumActivity,
        local_content: &str,
        in_sync: bool,
        now: Instant,
    ) -> ChecksumCheck {
        if self.is_recovering(activity.path()) {
            return ChecksumCheck::Recovering;
        }

        if !in_sync {
            debug!(
                path = %activity.path(),
                stamp = ?activity.timestamp(),
                "skipping stale checksum"
            );
            return ChecksumCheck::Stale;
        }

        let local = DocumentChecksum::of(local_content);

        if local == activity.checksum() {
            return ChecksumCheck::Match;
        }

        warn!(
            path = %activity.path(),
            local = ?local,
            host = ?activity.checksum(),
            "checksum mismatch"
        );

        let error = self.start_recovery(
            activity.source(),
            vec![activity.path().clone()],
            now,
        );

        ChecksumCheck::Mismatch(error)
    }

    /// Computes the checksum of `content` to be sent to a peer whose Jupiter
    /// state for the document is at `timestamp`.
    #[inline]
    pub fn checksum(
        &self,
        path: DocumentPath,
        content: &str,
        timestamp: JupiterTimestamp,
    ) -> ChecksumActivity {
        ChecksumActivity::new(
            self.local,
            path,
            DocumentChecksum::of(content),
            timestamp,
        )
    }

    /// Removes every session that has been open for longer than `timeout`,
    /// returning them.
    pub fn expire(
        &mut self,
        now: Instant,
        timeout: Duration,
    ) -> Vec<RecoverySession> {
        let expired = self
            .sessions
            .values()
            .filter(|s| now.saturating_duration_since(s.started_at) >= timeout)
            .map(|s| s.id)
            .collect::<Vec<_>>();

        expired
            .into_iter()
            .filter_map(|id| self.sessions.remove(&id))
            .inspect(|session| {
                warn!(
                    recovery = %session.id,
                    awaiting = session.awaiting.len(),
                    "abandoning recovery"
                );
            })
            .collect()
    }

    /// Returns `true` if a recovery is in progress for `path`.
    #[inline]
    pub fn is_recovering(&self, path: &DocumentPath) -> bool {
        self.session_for(path).is_some()
    }

    /// Creates a new watchdog for the local participant.
    #[inline]
    pub fn new(local: ParticipantId) -> Self {
        Self { local, sessions: HashMap::new() }
    }

    /// Forgets every open session.
    #[inline]
    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    /// Renames `old` to `new` in every open session.
    pub(crate) fn rename(&mut self, old: &DocumentPath, new: &DocumentPath) {
        for session in self.sessions.values_mut() {
            if session.awaiting.remove(old) {
                session.awaiting.insert(new.clone());
            }
        }
    }

    /// The open recovery sessions.
    #[inline]
    pub fn sessions(&self) -> impl Iterator<Item = &RecoverySession> {
        self.sessions.values()
    }

    /// Opens a new recovery session for `paths`, returning the activity
    /// asking `authority` for their content.
    pub fn start_recovery(
        &mut self,
        authority: ParticipantId,
        paths: Vec<DocumentPath>,
        now: Instant,
    ) -> ChecksumErrorActivity {
        let id = RecoveryId::new();

        info!(recovery = %id, paths = ?paths, "requesting recovery");

        self.sessions.insert(id, RecoverySession {
            id,
            initiator: self.local,
            awaiting: paths.iter().cloned().collect(),
            started_at: now,
        });

        ChecksumErrorActivity::new(self.local, authority, paths, id)
    }

    #[inline]
    fn session_for(&self, path: &DocumentPath) -> Option<&RecoverySession> {
        self.sessions.values().find(|s| s.awaiting.contains(path))
    }
}
