use core::hash::BuildHasherDefault;
use std::collections::HashMap;

/// A `HashMap` keyed by [`ParticipantId`]s, which hashes them with the
/// identity function.
pub type ParticipantIdMap<T> =
    HashMap<ParticipantId, T, BuildHasherDefault<ParticipantIdHasher>>;

/// A stable identifier for a participant of an editing session.
///
/// Internally this is a newtype around a 64-bit integer and can be created
/// via its [`From<u64>`](ParticipantId#impl-From<u64>-for-ParticipantId)
/// implementation.
///
/// Participant ids are totally ordered, and that order is load-bearing: when
/// two participants concurrently insert text at the same position, the
/// insertion of the participant with the *lower* id ends up first on every
/// site. It's therefore important that all the participants of a session
/// agree on each other's ids and that the ids are unique.
///
/// Guaranteeing uniqueness is up to you. The host of a session is in a good
/// position to assign ids centrally, e.g. by incrementing a counter every time
/// a new participant joins.
#[derive(Copy, Clone, PartialEq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ParticipantId(u64);

impl core::fmt::Debug for ParticipantId {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "ParticipantId({:x})", self.0)
    }
}

impl core::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl From<u64> for ParticipantId {
    #[inline]
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl core::cmp::Eq for ParticipantId {}

impl core::hash::Hash for ParticipantId {
    #[inline]
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        state.write_u64(self.0);
    }
}

impl ParticipantId {
    /// Returns the underlying integer.
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns `true` if an operation originating at `self` must be ordered
    /// before a concurrent operation originating at `other` when both insert
    /// at the same position.
    #[inline]
    pub fn wins_tie_against(self, other: Self) -> bool {
        self < other
    }
}

/// The permission a participant holds on the documents of a session.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Permission {
    /// The participant may only observe.
    ReadOnly,

    /// The participant may edit.
    #[default]
    Write,
}

/// The [`Hasher`](core::hash::Hasher) of a [`ParticipantIdMap`].
///
/// Participant ids are assigned by the host of a session, so they can be
/// used as their own hash.
#[derive(Default)]
pub struct ParticipantIdHasher(u64);

impl core::hash::Hasher for ParticipantIdHasher {
    fn write(&mut self, _bytes: &[u8]) {
        unreachable!();
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }

    #[inline]
    fn write_u64(&mut self, i: u64) {
        self.0 = i;
    }
}
