//! The asynchronous shell around the per-document state machines.
//!
//! A [`Session`] spawns one actor per shared document. Each actor owns the
//! [`DocumentState`] of its document and is the only one touching it, so
//! different documents are processed in parallel while everything about a
//! single document is linearized. The only state the actors share is the
//! [`SessionContext`].

mod actor;
mod context;
mod event;
mod transport;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use actor::Command;
pub use context::SessionContext;
pub use event::SessionEvent;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};
pub use transport::{ChannelTransport, Outgoing, Recipient, Transport};

use crate::{
    Activity,
    ChecksumErrorActivity,
    DocumentBuffers,
    DocumentPath,
    DocumentState,
    Error,
    FileActivity,
    FileChange,
    Operation,
    ParticipantId,
    Permission,
    PermissionActivity,
    Purpose,
    Result,
    SessionConfig,
    TextPosition,
    TextSelectionActivity,
    ViewportActivity,
};

/// A participant's view of a collaborative editing session.
///
/// The two entry points are
/// [`on_activity_received`](Self::on_activity_received), fed by the
/// transport, and [`local_edit_occurred`](Self::local_edit_occurred), fed
/// by the editor. Everything the editor has to know about comes out of the
/// event receiver returned by [`join`](Self::join).
///
/// A session must be joined from within a tokio runtime.
pub struct Session {
    context: Arc<SessionContext>,
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    buffers: Arc<dyn DocumentBuffers>,
    documents: Mutex<HashMap<DocumentPath, DocumentHandle>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    closed: AtomicBool,
}

struct DocumentHandle {
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("context", &self.context)
            .field("documents", &self.documents.lock().len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Session {
    /// The session's participants.
    #[inline]
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Shares a new document with the given content.
    pub async fn create_document(
        &self,
        path: DocumentPath,
        content: String,
    ) -> Result<()> {
        self.ensure_open()?;

        let file =
            FileActivity::created(self.context.local(), path.clone(), content);

        if let Some(content) = file.content() {
            self.buffers.replace_content(&path, content.to_owned());
        }

        self.open_document(path)?;

        self.transport.send_activity(Recipient::Broadcast, file.into());

        Ok(())
    }

    /// Flushes the local activities of every document, returning once
    /// they've been handed to the transport.
    pub async fn flush(&self) -> Result<()> {
        self.ensure_open()?;

        let mut replies = Vec::new();

        for commands in self.senders() {
            let (tx, rx) = oneshot::channel();
            if commands.send(Command::Flush(tx)).await.is_ok() {
                replies.push(rx);
            }
        }

        for reply in replies {
            // The actor may have been stopped in the meantime.
            let _ = reply.await;
        }

        Ok(())
    }

    /// Starts a session described by `context`.
    ///
    /// Returns the session and the receiver of its events. Dropping the
    /// receiver is fine: events are then discarded.
    pub fn join(
        context: SessionContext,
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        buffers: Arc<dyn DocumentBuffers>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();

        info!(
            local = %context.local(),
            host = %context.host(),
            "joined session"
        );

        let session = Self {
            context: Arc::new(context),
            config,
            transport,
            buffers,
            documents: Mutex::new(HashMap::new()),
            events,
            closed: AtomicBool::new(false),
        };

        (session, rx)
    }

    /// Leaves the session.
    ///
    /// Every document actor is stopped at once, dropping its Jupiter states,
    /// its buffered activities and its recoveries without delivering
    /// anything else. Every later call on the session fails with
    /// [`SessionClosed`](Error::SessionClosed).
    pub fn leave(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let documents = core::mem::take(&mut *self.documents.lock());

        for (path, handle) in documents {
            debug!(%path, "stopping document actor");
            handle.task.abort();
        }

        info!(local = %self.context.local(), "left session");
    }

    /// Reports a local edit of `path`, already applied to its buffer.
    ///
    /// Fails with [`ReadOnly`](Error::ReadOnly) if the local participant
    /// isn't allowed to edit. The edit is then undone by recovering the
    /// document from the host.
    pub async fn local_edit_occurred(
        &self,
        path: &DocumentPath,
        operation: Operation,
    ) -> Result<()> {
        let local = self.context.local();

        if !self.context.can_write(local) {
            self.send(path, Command::RequestRecovery).await?;
            return Err(Error::ReadOnly {
                path: path.clone(),
                participant: local,
            });
        }

        self.send(path, Command::LocalEdit(operation)).await
    }

    /// Reports that the local participant moved its selection.
    pub async fn local_selection(
        &self,
        path: &DocumentPath,
        anchor: TextPosition,
        head: TextPosition,
    ) -> Result<()> {
        let selection = TextSelectionActivity::new(
            self.context.local(),
            path.clone(),
            anchor,
            head,
        );

        self.send(path, Command::LocalAwareness(selection.into())).await
    }

    /// Reports that the local participant scrolled.
    pub async fn local_viewport(
        &self,
        path: &DocumentPath,
        start_line: u32,
        line_count: u32,
    ) -> Result<()> {
        let viewport = ViewportActivity::new(
            self.context.local(),
            path.clone(),
            start_line,
            line_count,
        );

        self.send(path, Command::LocalAwareness(viewport.into())).await
    }

    /// Moves a shared document.
    pub async fn move_document(
        &self,
        from: &DocumentPath,
        to: DocumentPath,
    ) -> Result<()> {
        self.ensure_open()?;

        self.rename_document(from, to.clone()).await?;

        let file = FileActivity::moved(self.context.local(), from.clone(), to);

        self.transport.send_activity(Recipient::Broadcast, file.into());

        Ok(())
    }

    /// Handles an activity received from the network.
    ///
    /// Activities that fail validation are dropped and reported as
    /// [`MalformedActivity`](Error::MalformedActivity); activities about a
    /// document that isn't shared are reported as
    /// [`UnknownDocument`](Error::UnknownDocument). Consistency problems
    /// aren't errors at this level: they're handled by recovering the
    /// affected documents.
    pub async fn on_activity_received(&self, activity: Activity) -> Result<()> {
        self.ensure_open()?;

        if let Err(reason) = activity.validate() {
            return Err(self.malformed(activity.source(), reason));
        }

        match activity {
            // Edits are stamped before they leave their site.
            Activity::Edit(edit) => {
                Err(self.malformed(edit.source(), "unstamped edit"))
            },

            Activity::Jupiter(_)
            | Activity::TextSelection(_)
            | Activity::Viewport(_)
            | Activity::Checksum(_) => {
                let Some(path) = activity.path().cloned() else {
                    let source_id = activity.source();
                    return Err(
                        self.malformed(source_id, "missing document path")
                    );
                };

                self.send(&path, Command::Remote(activity)).await
            },

            Activity::ChecksumError(error) => {
                self.on_checksum_error(error).await;
                Ok(())
            },

            Activity::File(file) => self.on_file(file).await,

            Activity::Folder(folder) => {
                self.emit(SessionEvent::FolderChanged(folder));
                Ok(())
            },

            Activity::Permission(permission) => {
                self.on_permission(permission);
                Ok(())
            },
        }
    }

    /// Starts sharing a document whose buffer is already open, without
    /// telling the other participants about it.
    ///
    /// This is how the documents shared when the session starts are
    /// registered on every participant.
    pub fn open_document(&self, path: DocumentPath) -> Result<()> {
        self.ensure_open()?;

        let mut documents = self.documents.lock();

        if documents.contains_key(&path) {
            return Ok(());
        }

        let state = DocumentState::new(
            path.clone(),
            Arc::clone(&self.context),
            Arc::clone(&self.buffers),
            self.config.clone(),
        );

        let (commands, rx) = mpsc::channel(self.config.actor_queue_capacity);

        let span = tracing::info_span!(
            "document",
            path = %path,
            local = %self.context.local()
        );

        let task = tokio::spawn(
            actor::run(
                state,
                rx,
                Arc::clone(&self.transport),
                self.events.clone(),
                self.config.clone(),
                self.context.is_host(),
            )
            .instrument(span),
        );

        debug!(%path, "opened document");

        documents.insert(path, DocumentHandle { commands, task });

        Ok(())
    }

    /// The paths of every shared document, sorted.
    pub fn paths(&self) -> Vec<DocumentPath> {
        let mut paths =
            self.documents.lock().keys().cloned().collect::<Vec<_>>();
        paths.sort();
        paths
    }

    /// Stops sharing a document and removes it.
    pub async fn remove_document(&self, path: &DocumentPath) -> Result<()> {
        self.ensure_open()?;

        self.close_document(path)?;

        let file = FileActivity::removed(self.context.local(), path.clone());

        self.transport.send_activity(Recipient::Broadcast, file.into());

        Ok(())
    }

    /// Asks the host for the authoritative content of `path`. On the host
    /// this pushes the content to every other participant instead.
    pub async fn request_recovery(&self, path: &DocumentPath) -> Result<()> {
        self.send(path, Command::RequestRecovery).await
    }

    /// Runs a checksum pass over every document now, without waiting for
    /// the periodic one. Does nothing on participants other than the host.
    pub async fn run_checksum_pass(&self) -> Result<()> {
        self.ensure_open()?;

        for commands in self.senders() {
            if commands.send(Command::ChecksumPass).await.is_err() {
                debug!("document actor stopped before its checksum pass");
            }
        }

        Ok(())
    }

    /// Changes the permission of a participant and tells everyone else.
    ///
    /// Only the host's permission changes are honored by the other
    /// participants.
    pub fn set_permission(
        &self,
        target: ParticipantId,
        permission: Permission,
    ) -> Result<()> {
        self.ensure_open()?;

        if !self.context.is_host() {
            warn!(%target, "only the host can change permissions");
        }

        self.context.add_participant(target, permission);

        let activity =
            PermissionActivity::new(self.context.local(), target, permission);

        self.transport.send_activity(Recipient::Broadcast, activity.into());

        Ok(())
    }

    #[inline]
    fn close_document(&self, path: &DocumentPath) -> Result<()> {
        let handle = self
            .documents
            .lock()
            .remove(path)
            .ok_or_else(|| Error::UnknownDocument(path.clone()))?;

        handle.task.abort();

        self.buffers.remove(path);

        debug!(%path, "closed document");

        Ok(())
    }

    #[inline]
    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    #[inline]
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(Error::SessionClosed)
        } else {
            Ok(())
        }
    }

    /// Reports an activity dropped for being malformed, returning the
    /// matching error.
    fn malformed(
        &self,
        source_id: ParticipantId,
        reason: &'static str,
    ) -> Error {
        warn!(from = %source_id, reason, "dropping malformed activity");

        self.emit(SessionEvent::ActivityDropped {
            from: source_id,
            reason: reason.to_owned(),
        });

        Error::MalformedActivity { source_id, reason }
    }

    async fn on_checksum_error(&self, error: ChecksumErrorActivity) {
        if !self.context.is_host() {
            warn!(from = %error.source(), "checksum error sent to a peer");
            return;
        }

        // Every document answers for itself.
        for path in error.paths() {
            let single = ChecksumErrorActivity::new(
                error.source(),
                error.target(),
                vec![path.clone()],
                error.recovery_id(),
            );

            let command = Command::Remote(single.into());

            if let Err(err) = self.send(path, command).await {
                warn!(%path, recovery = %error.recovery_id(), "{err}");
            }
        }
    }

    async fn on_file(&self, file: FileActivity) -> Result<()> {
        let path = file.path().clone();

        match file.change() {
            FileChange::Created => {
                if file.purpose() == Purpose::Recovery && self.context.is_host()
                {
                    warn!(%path, "recovery file sent to the host");
                    return Ok(());
                }

                if !self.documents.lock().contains_key(&path) {
                    self.buffers.replace_content(&path, String::new());
                    self.open_document(path.clone())?;
                }

                self.send(&path, Command::Remote(file.into())).await
            },

            FileChange::Removed => {
                self.close_document(&path)?;
                self.emit(SessionEvent::DocumentRemoved { path });
                Ok(())
            },

            FileChange::Moved => {
                let Some(from) = file.old_path() else {
                    return Err(self.malformed(
                        file.source(),
                        "file move without a valid old path",
                    ));
                };
                self.rename_document(from, path).await
            },
        }
    }

    fn on_permission(&self, activity: PermissionActivity) {
        if activity.source() != self.context.host() {
            warn!(
                from = %activity.source(),
                target = %activity.target(),
                "ignoring permission change not made by the host"
            );
            return;
        }

        self.context.add_participant(activity.target(), activity.permission());

        self.emit(SessionEvent::PermissionChanged {
            participant: activity.target(),
            permission: activity.permission(),
        });
    }

    async fn rename_document(
        &self,
        from: &DocumentPath,
        to: DocumentPath,
    ) -> Result<()> {
        let commands = {
            let mut documents = self.documents.lock();

            let handle = documents
                .remove(from)
                .ok_or_else(|| Error::UnknownDocument(from.clone()))?;

            let commands = handle.commands.clone();

            if let Some(replaced) = documents.insert(to.clone(), handle) {
                warn!(path = %to, "moved document over a shared one");
                replaced.task.abort();
            }

            commands
        };

        if let Some(content) = self.buffers.current_content(from) {
            self.buffers.replace_content(&to, content);
        }
        self.buffers.remove(from);

        commands
            .send(Command::Rename(to.clone()))
            .await
            .map_err(|_| Error::SessionClosed)?;

        self.emit(SessionEvent::DocumentMoved { from: from.clone(), to });

        Ok(())
    }

    /// Sends a command to the actor of `path`.
    async fn send(&self, path: &DocumentPath, command: Command) -> Result<()> {
        self.ensure_open()?;

        let commands = self
            .documents
            .lock()
            .get(path)
            .map(|handle| handle.commands.clone())
            .ok_or_else(|| Error::UnknownDocument(path.clone()))?;

        commands.send(command).await.map_err(|_| Error::SessionClosed)
    }

    #[inline]
    fn senders(&self) -> Vec<mpsc::Sender<Command>> {
        self.documents
            .lock()
            .values()
            .map(|handle| handle.commands.clone())
            .collect()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for handle in self.documents.get_mut().values() {
            handle.task.abort();
        }
    }
}
