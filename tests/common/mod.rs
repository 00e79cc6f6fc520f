#![allow(dead_code)]

use std::collections::VecDeque;
use std::fmt::Debug;
use std::ops::Range;
use std::sync::Arc;

use lockstep::{
    Activity,
    DocumentBuffers,
    DocumentPath,
    DocumentState,
    MemoryBuffers,
    Operation,
    ParticipantId,
    Permission,
    Recipient,
    SessionConfig,
    SessionContext,
    SessionEvent,
    TextPosition,
};
use rand::Rng;
use tokio::time::{Duration, Instant};

/// One participant of a [`Network`], holding a single-line document.
pub struct Peer {
    pub context: Arc<SessionContext>,
    pub buffers: Arc<MemoryBuffers>,
    pub state: DocumentState,
    pub events: Vec<SessionEvent>,
}

impl Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id())
            .field("content", &self.content())
            .field("state", &self.state)
            .finish()
    }
}

impl PartialEq<Peer> for Peer {
    fn eq(&self, rhs: &Peer) -> bool {
        self.content() == rhs.content()
    }
}

impl PartialEq<&str> for Peer {
    fn eq(&self, rhs: &&str) -> bool {
        self.content() == *rhs
    }
}

impl PartialEq<Peer> for &str {
    fn eq(&self, rhs: &Peer) -> bool {
        rhs.content() == *self
    }
}

impl Peer {
    pub fn content(&self) -> String {
        self.buffers.current_content(self.state.path()).unwrap_or_default()
    }

    /// Replaces the content behind the session's back, making the peer
    /// diverge.
    pub fn corrupt(&mut self, content: &str) {
        self.buffers.replace_content(self.state.path(), content.to_owned());
    }

    pub fn delete(&mut self, range: Range<u32>) -> Operation {
        let text = self
            .content()
            .chars()
            .skip(range.start as usize)
            .take((range.end - range.start) as usize)
            .collect::<String>();

        let op = Operation::delete(TextPosition::new(0, range.start), text);
        self.edit(op)
    }

    pub fn edit(&mut self, op: Operation) -> Operation {
        self.buffers.edit(self.state.path(), &op).unwrap();
        self.state.local_edit(op.clone()).unwrap();
        op
    }

    pub fn id(&self) -> ParticipantId {
        self.context.local()
    }

    pub fn insert<T: Into<String>>(
        &mut self,
        offset: u32,
        text: T,
    ) -> Operation {
        let op = Operation::insert(TextPosition::new(0, offset), text);
        self.edit(op)
    }

    pub fn len(&self) -> u32 {
        self.content().chars().count() as u32
    }

    /// Like [`random_edit`](Self::random_edit), but anywhere in a document
    /// made of several lines, inserting and deleting line breaks too.
    pub fn random_multiline_edit(&mut self, rng: &mut impl Rng) -> Operation {
        let op = random_multiline_op(rng, &self.content());
        self.edit(op)
    }

    pub fn random_edit(
        &mut self,
        rng: &mut impl Rng,
        max_insertion_len: u32,
        max_deletion_len: u32,
    ) -> Operation {
        let len = self.len();

        if len == 0 || rng.random::<bool>() {
            let offset = rng.random_range(0..=len);
            let text_len = rng.random_range(1..=max_insertion_len);
            let letter = rng.random_range('a'..='z');
            let text = (0..text_len).map(|_| letter).collect::<String>();
            self.insert(offset, text)
        } else {
            let start = rng.random_range(0..len);
            let len_deleted = rng.random_range(1..=max_deletion_len);
            let end = (start + len_deleted).min(len);
            self.delete(start..end)
        }
    }

    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        core::mem::take(&mut self.events)
    }
}

/// Returns the position of the `idx`-th character of `text`.
pub fn position_at(text: &str, idx: usize) -> TextPosition {
    let before = text.chars().take(idx).collect::<String>();
    let line = before.matches('\n').count() as u32;
    let offset = before.rsplit('\n').next().unwrap_or("").chars().count();
    TextPosition::new(line, offset as u32)
}

/// A random insertion or deletion of up to a few characters, line breaks
/// included, anywhere in `text`.
pub fn random_multiline_op(rng: &mut impl Rng, text: &str) -> Operation {
    let len = text.chars().count();

    if len == 0 || rng.random::<bool>() {
        let at = rng.random_range(0..=len);
        let inserted = (0..rng.random_range(1..=4))
            .map(|_| {
                if rng.random_ratio(1, 3) {
                    '\n'
                } else {
                    rng.random_range('a'..='z')
                }
            })
            .collect::<String>();
        Operation::insert(position_at(text, at), inserted)
    } else {
        let start = rng.random_range(0..len);
        let end = (start + rng.random_range(1..=6)).min(len);
        let deleted =
            text.chars().skip(start).take(end - start).collect::<String>();
        Operation::delete(position_at(text, start), deleted)
    }
}

/// An activity in flight between two peers.
#[derive(Debug, Clone)]
pub struct Message {
    pub from: ParticipantId,
    pub to: ParticipantId,
    pub activity: Activity,
}

/// A star-shaped session sharing a single document, with the host at index
/// zero and the messages between the peers held in a queue until they're
/// delivered.
pub struct Network {
    pub peers: Vec<Peer>,
    pub now: Instant,
    in_flight: VecDeque<Message>,
}

impl Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("peers", &self.peers)
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

impl Network {
    pub fn advance(&mut self, duration: Duration) {
        self.now += duration;
    }

    pub fn client(&mut self, idx: usize) -> &mut Peer {
        assert!(idx > 0, "index 0 is the host");
        &mut self.peers[idx]
    }

    /// Collects what every peer has queued for sending.
    pub fn collect(&mut self) {
        let ids = self.peers.iter().map(Peer::id).collect::<Vec<_>>();

        for peer in &mut self.peers {
            let from = peer.id();

            for (recipient, activity) in peer.state.take_outbox() {
                match recipient {
                    Recipient::Participant(to) => {
                        self.in_flight.push_back(Message { from, to, activity })
                    },
                    Recipient::Broadcast => {
                        for &to in ids.iter().filter(|&&id| id != from) {
                            self.in_flight.push_back(Message {
                                from,
                                to,
                                activity: activity.clone(),
                            });
                        }
                    },
                }
            }

            peer.events.extend(peer.state.take_events());
        }
    }

    pub fn deliver(&mut self, message: Message) {
        let now = self.now;
        let peer = self.peer_mut(message.to);
        peer.state.receive(&message.activity, now);
        self.collect();
    }

    /// Delivers every message in flight, including the ones sent in
    /// response, in order.
    pub fn deliver_all(&mut self) {
        while let Some(message) = self.in_flight.pop_front() {
            self.deliver(message);
        }
    }

    /// Delivers the oldest message in flight, returning `false` if there
    /// was none.
    pub fn deliver_next(&mut self) -> bool {
        match self.pop() {
            Some(message) => {
                self.deliver(message);
                true
            },
            None => false,
        }
    }

    /// Like [`deliver_all`](Self::deliver_all), but in random order.
    pub fn deliver_all_shuffled(&mut self, rng: &mut impl Rng) {
        while !self.in_flight.is_empty() {
            let idx = rng.random_range(0..self.in_flight.len());
            let message = self.in_flight.remove(idx).unwrap();
            self.deliver(message);
        }
    }

    pub fn flush(&mut self) {
        for peer in &mut self.peers {
            peer.state.flush();
        }
        self.collect();
    }

    pub fn host(&mut self) -> &mut Peer {
        &mut self.peers[0]
    }

    pub fn in_flight(&self) -> &VecDeque<Message> {
        &self.in_flight
    }

    pub fn new<T: Into<String>>(num_clients: u64, content: T) -> Self {
        Self::with_config(num_clients, content, SessionConfig::default())
    }

    pub fn path() -> DocumentPath {
        DocumentPath::from("shared.txt")
    }

    pub fn peer_mut(&mut self, id: ParticipantId) -> &mut Peer {
        self.peers
            .iter_mut()
            .find(|peer| peer.id() == id)
            .unwrap_or_else(|| panic!("no peer with id {id}"))
    }

    /// Takes the messages in flight without delivering them.
    pub fn intercept(&mut self) -> Vec<Message> {
        self.in_flight.drain(..).collect()
    }

    /// Takes the oldest message in flight without delivering it.
    pub fn pop(&mut self) -> Option<Message> {
        self.in_flight.pop_front()
    }

    pub fn send(&mut self, message: Message) {
        self.in_flight.push_back(message);
    }

    /// Flushes and delivers until nothing is left in flight.
    pub fn settle(&mut self) {
        self.flush();
        self.deliver_all();
    }

    /// Runs the periodic maintenance of every peer.
    pub fn tick(&mut self) {
        let now = self.now;
        for peer in &mut self.peers {
            peer.state.tick(now);
        }
        self.collect();
    }

    pub fn with_config<T: Into<String>>(
        num_clients: u64,
        content: T,
        config: SessionConfig,
    ) -> Self {
        let content = content.into();
        let host = ParticipantId::from(0);
        let ids =
            (0..=num_clients).map(ParticipantId::from).collect::<Vec<_>>();

        let peers = ids
            .iter()
            .map(|&id| {
                let context = Arc::new(SessionContext::new(id, host));

                for &other in &ids {
                    context.add_participant(other, Permission::Write);
                }

                let buffers = Arc::new(MemoryBuffers::new());
                buffers.replace_content(&Self::path(), content.clone());

                let state = DocumentState::new(
                    Self::path(),
                    Arc::clone(&context),
                    Arc::clone(&buffers) as Arc<dyn DocumentBuffers>,
                    config.clone(),
                );

                Peer { context, buffers, state, events: Vec::new() }
            })
            .collect();

        Self { peers, now: Instant::now(), in_flight: VecDeque::new() }
    }
}

#[macro_export]
macro_rules! assert_convergence {
    ($slice:expr) => {{
        for peer in $slice[1..].iter() {
            if &$slice[0] != peer {
                panic!("left: {:#?}\nright: {:#?}", &$slice[0], peer);
            }
        }
    }};

    ($one:expr, $two:expr) => {{
        if $one != $two {
            panic!("left: {:#?}\nright: {:#?}", $one, $two);
        }
    }};

    ($one:expr, $two:expr, $three:expr) => {{
        assert_eq!($one, $two, "{:#?} vs {:#?}", $one, $two);
        assert_eq!($two, $three, "{:#?} vs {:#?}", $two, $three);
    }};

    ($one:expr, $two:expr, $three:expr, $four:expr) => {{
        assert_eq!($one, $two, "{:#?} vs {:#?}", $one, $two);
        assert_eq!($two, $three, "{:#?} vs {:#?}", $two, $three);
        assert_eq!($three, $four, "{:#?} vs {:#?}", $three, $four);
    }};
}
