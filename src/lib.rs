//! lockstep keeps the replicas of a shared text document identical while
//! several participants edit it at the same time.
//!
//! It's built around three pieces:
//!
//! - the [`Jupiter`] engine, which stamps the local [`Operation`]s sent to a
//!   peer and [transforms](fn@transform) the operations received from it
//!   against the local ones the peer hadn't seen yet;
//!
//! - the [`InboundSequencer`], which puts the operations received from a
//!   peer back in the order they were generated in, and [`coalesce`], which
//!   compacts bursts of local activities before they're sent;
//!
//! - the [`ConsistencyWatchdog`], which compares checksums of the replicas
//!   and, when they diverge anyway, replaces the diverging replica with the
//!   authoritative content.
//!
//! Sessions follow a star topology: one participant hosts the session and
//! relays every operation to everyone else, so each participant only ever
//! runs Jupiter with the host, and the host runs it once per participant.
//! The [`Session`] type wires everything together on top of tokio, with one
//! actor per document. Using it is optional: [`DocumentState`] is the same
//! machinery without any I/O, and the pieces above can be used on their own.
//!
//! # Example
//!
//! Two participants insert text at the same position at the same time:
//!
//! ```
//! use lockstep::{
//!     DocumentPath, Jupiter, Operation, ParticipantId, TextPosition,
//! };
//!
//! let path = DocumentPath::from("notes.txt");
//!
//! let alice = ParticipantId::from(1);
//! let bob = ParticipantId::from(2);
//!
//! // Each side has a Jupiter engine paired with the other one.
//! let mut at_alice = Jupiter::new(path.clone(), bob);
//! let mut at_bob = Jupiter::new(path, alice);
//!
//! let mut alice_doc = String::from("hello");
//! let mut bob_doc = alice_doc.clone();
//!
//! let x = Operation::insert(TextPosition::new(0, 5), "X");
//! x.apply_to(&mut alice_doc)?;
//! let to_bob = at_alice.generate(alice, x);
//!
//! let y = Operation::insert(TextPosition::new(0, 5), "Y");
//! y.apply_to(&mut bob_doc)?;
//! let to_alice = at_bob.generate(bob, y);
//!
//! at_bob.receive(&to_bob)?.apply_to(&mut bob_doc)?;
//! at_alice.receive(&to_alice)?.apply_to(&mut alice_doc)?;
//!
//! // Alice has the lower id, so her text comes first on both sides.
//! assert_eq!(alice_doc, "helloXY");
//! assert_eq!(bob_doc, "helloXY");
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! ```
//!
//! # Feature flags
//!
//! - `serde`: derives `Serialize` and `Deserialize` for every activity and
//!   for [`SessionConfig`]. Enabled by default.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

mod activity;
mod buffer;
mod checksum;
mod config;
mod document;
mod error;
mod jupiter;
mod operation;
mod participant;
mod path;
mod sequencer;
mod session;
mod text;
mod timestamp;
mod transform;
mod watchdog;

pub use activity::*;
pub use buffer::{DocumentBuffers, MemoryBuffers, TextBuffer};
pub use checksum::DocumentChecksum;
pub use config::SessionConfig;
pub use document::DocumentState;
pub use error::{BufferError, Error, OperationError, Result};
pub use jupiter::{Jupiter, JupiterState};
pub use operation::{Operation, TextRun};
pub use participant::{ParticipantId, ParticipantIdMap, Permission};
pub use path::DocumentPath;
pub use sequencer::{coalesce, InboundSequencer, Released};
pub use session::{
    ChannelTransport,
    Outgoing,
    Recipient,
    Session,
    SessionContext,
    SessionEvent,
    Transport,
};
pub use text::{TextDelta, TextPosition};
pub use timestamp::JupiterTimestamp;
pub use transform::transform;
pub use watchdog::{
    ChecksumCheck,
    ConsistencyWatchdog,
    RecoveryProgress,
    RecoverySession,
};
