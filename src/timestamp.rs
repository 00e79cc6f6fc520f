/// A Jupiter timestamp, i.e. the state of one side of a peer-pair for a
/// single document.
///
/// `local` is the number of operations this side has generated for the
/// other side, `remote` is the number of operations it has received from the
/// other side. Both only ever grow, except when the peer-pair is reset by a
/// recovery, which starts a new `generation` from `(0, 0)`.
///
/// Timestamps of different generations are never comparable: an activity
/// stamped before a recovery is stale once the recovery has gone through.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JupiterTimestamp {
    #[cfg_attr(feature = "serde", serde(default))]
    generation: u32,
    local: u32,
    remote: u32,
}

impl core::fmt::Debug for JupiterTimestamp {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if self.generation == 0 {
            write!(f, "JupiterTimestamp({}, {})", self.local, self.remote)
        } else {
            write!(
                f,
                "JupiterTimestamp({}, {} @{})",
                self.local, self.remote, self.generation
            )
        }
    }
}

impl JupiterTimestamp {
    /// Creates a new timestamp in the first generation.
    #[inline]
    pub const fn new(local: u32, remote: u32) -> Self {
        Self { generation: 0, local, remote }
    }

    /// The `(0, 0)` timestamp of the given generation.
    #[inline]
    pub const fn baseline(generation: u32) -> Self {
        Self { generation, local: 0, remote: 0 }
    }

    /// The number of recoveries the peer-pair went through.
    #[inline]
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// The number of operations generated by the sender.
    #[inline]
    pub const fn local(&self) -> u32 {
        self.local
    }

    /// The number of operations the sender has received from the recipient.
    #[inline]
    pub const fn remote(&self) -> u32 {
        self.remote
    }

    /// Returns the timestamp as seen from the other side of the peer-pair.
    #[inline]
    pub const fn mirrored(self) -> Self {
        Self {
            generation: self.generation,
            local: self.remote,
            remote: self.local,
        }
    }

    #[inline]
    pub(crate) fn increment_local(&mut self) -> Self {
        let current = *self;
        self.local += 1;
        current
    }

    #[inline]
    pub(crate) fn increment_remote(&mut self) {
        self.remote += 1;
    }
}
