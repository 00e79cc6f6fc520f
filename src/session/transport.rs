use tokio::sync::mpsc;
use tracing::trace;

use crate::{Activity, ParticipantId};

/// Who an outgoing activity is addressed to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Recipient {
    /// A single participant.
    Participant(ParticipantId),

    /// Every participant of the session except the sender.
    Broadcast,
}

/// The network, as seen by a [`Session`](crate::Session).
///
/// Sending must not block: implementations queue the activity and return.
/// Activities sent to the same recipient should be delivered in order, but
/// the session tolerates reordering of Jupiter activities.
pub trait Transport: Send + Sync + 'static {
    /// Queues `activity` for delivery to `recipient`.
    fn send_activity(&self, recipient: Recipient, activity: Activity);
}

/// A [`Transport`] that pushes every outgoing activity into a channel,
/// together with its recipient.
///
/// Whoever owns the receiving half is responsible for the actual delivery,
/// which makes this the natural transport for in-process sessions and
/// tests.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    sender: ParticipantId,
    tx: mpsc::UnboundedSender<Outgoing>,
}

/// An activity sent through a [`ChannelTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    /// The participant that sent it.
    pub from: ParticipantId,

    /// Who it's addressed to.
    pub to: Recipient,

    /// The activity.
    pub activity: Activity,
}

impl ChannelTransport {
    /// Creates a new transport for `sender`, returning the receiving half
    /// of its channel.
    #[inline]
    pub fn new(
        sender: ParticipantId,
    ) -> (Self, mpsc::UnboundedReceiver<Outgoing>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { sender, tx }, rx)
    }
}

impl Transport for ChannelTransport {
    #[inline]
    fn send_activity(&self, to: Recipient, activity: Activity) {
        trace!(from = %self.sender, ?to, kind = ?activity.kind(), "sending");

        let outgoing = Outgoing { from: self.sender, to, activity };

        if self.tx.send(outgoing).is_err() {
            trace!(from = %self.sender, "transport closed, dropping activity");
        }
    }
}
