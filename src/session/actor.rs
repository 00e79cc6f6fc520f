use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Duration, Instant, Interval, MissedTickBehavior};
use tracing::{debug, trace};

use super::{SessionEvent, Transport};
use crate::{Activity, DocumentPath, DocumentState, Operation, SessionConfig};

/// What a document actor can be asked to do.
#[derive(Debug)]
pub(super) enum Command {
    /// Handle an activity received from the network.
    Remote(Activity),

    /// Queue a local edit.
    LocalEdit(Operation),

    /// Queue a local selection or viewport change.
    LocalAwareness(Activity),

    /// Flush the local activities now, and reply once they're sent.
    Flush(oneshot::Sender<()>),

    /// Run a checksum pass now.
    ChecksumPass,

    /// Ask for (or, on the host, push) the authoritative content.
    RequestRecovery,

    /// The document was moved.
    Rename(DocumentPath),
}

/// The loop owning a [`DocumentState`].
///
/// Every mutation of the document goes through here, one command or timer
/// tick at a time. The loop ends when every sender of `commands` is dropped.
pub(super) async fn run(
    mut state: DocumentState,
    mut commands: mpsc::Receiver<Command>,
    transport: Arc<dyn Transport>,
    events: mpsc::UnboundedSender<SessionEvent>,
    config: SessionConfig,
    is_host: bool,
) {
    let mut flush = interval(config.flush_interval);

    let mut maintenance = interval(config.maintenance_interval());

    let mut checksum = config
        .checksum_interval
        .filter(|_| is_host)
        .map(|period| {
            let period = period.max(Duration::from_millis(1));
            let mut interval =
                time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

    loop {
        let mut reply = None;

        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                reply = handle(&mut state, command);
            },

            _ = flush.tick() => state.flush(),

            _ = maintenance.tick() => state.tick(Instant::now()),

            _ = maybe_tick(&mut checksum) => state.checksum_pass(),
        }

        deliver(&mut state, &*transport, &events);

        if let Some(reply) = reply {
            let _ = reply.send(());
        }
    }

    debug!(path = %state.path(), "document actor stopped");
}

#[inline]
fn deliver(
    state: &mut DocumentState,
    transport: &dyn Transport,
    events: &mpsc::UnboundedSender<SessionEvent>,
) {
    for (recipient, activity) in state.take_outbox() {
        transport.send_activity(recipient, activity);
    }

    for event in state.take_events() {
        if events.send(event).is_err() {
            trace!(path = %state.path(), "no one is listening for events");
        }
    }
}

#[inline]
fn handle(
    state: &mut DocumentState,
    command: Command,
) -> Option<oneshot::Sender<()>> {
    match command {
        Command::Remote(activity) => state.receive(&activity, Instant::now()),
        Command::LocalEdit(operation) => {
            // The permission may have changed since the session checked it.
            if let Err(err) = state.local_edit(operation) {
                debug!(path = %state.path(), "{err}");
            }
        },
        Command::LocalAwareness(activity) => state.local_awareness(activity),
        Command::Flush(reply) => {
            state.flush();
            return Some(reply);
        },
        Command::ChecksumPass => state.checksum_pass(),
        Command::RequestRecovery => state.request_recovery(Instant::now()),
        Command::Rename(path) => state.rename(path),
    }

    None
}

#[inline]
fn interval(period: Duration) -> Interval {
    let mut interval = time::interval(period.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Ticks `interval` if there is one, otherwise never completes.
#[inline]
async fn maybe_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        },
        None => core::future::pending().await,
    }
}
