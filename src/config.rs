use core::time::Duration;

/// Tunables of a [`Session`](crate::Session).
///
/// Every field has a sensible default, so the usual way to build one is
/// `SessionConfig::default()` followed by the `with_*` methods for the
/// fields that need changing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// How long a gap in an inbound stream may persist before it's reported
    /// as a possible desync.
    pub sequencing_timeout: Duration,

    /// The period of the host's checksum pass. `None` disables the periodic
    /// pass, leaving only on-demand ones.
    pub checksum_interval: Option<Duration>,

    /// The period of the outbound flush, which coalesces the local
    /// activities accumulated since the previous one.
    pub flush_interval: Duration,

    /// How long a recovery may wait for its files before it's abandoned.
    pub recovery_timeout: Duration,

    /// Whether a sequencing timeout starts a recovery of the document.
    pub auto_recover_on_timeout: bool,

    /// The bound of each document actor's mailbox.
    pub actor_queue_capacity: usize,
}

impl Default for SessionConfig {
    #[inline]
    fn default() -> Self {
        Self {
            sequencing_timeout: Duration::from_secs(5),
            checksum_interval: Some(Duration::from_secs(2)),
            flush_interval: Duration::from_millis(50),
            recovery_timeout: Duration::from_secs(10),
            auto_recover_on_timeout: true,
            actor_queue_capacity: 256,
        }
    }
}

impl SessionConfig {
    /// How often a document actor looks for expired sequencing gaps and
    /// recoveries.
    #[inline]
    pub(crate) fn maintenance_interval(&self) -> Duration {
        (self.sequencing_timeout.min(self.recovery_timeout) / 4)
            .max(Duration::from_millis(1))
    }

    /// Sets [`actor_queue_capacity`](Self::actor_queue_capacity).
    #[inline]
    pub fn with_actor_queue_capacity(mut self, capacity: usize) -> Self {
        self.actor_queue_capacity = capacity.max(1);
        self
    }

    /// Sets [`auto_recover_on_timeout`](Self::auto_recover_on_timeout).
    #[inline]
    pub fn with_auto_recover_on_timeout(mut self, auto_recover: bool) -> Self {
        self.auto_recover_on_timeout = auto_recover;
        self
    }

    /// Sets [`checksum_interval`](Self::checksum_interval).
    #[inline]
    pub fn with_checksum_interval(
        mut self,
        interval: Option<Duration>,
    ) -> Self {
        self.checksum_interval = interval;
        self
    }

    /// Sets [`flush_interval`](Self::flush_interval).
    #[inline]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Sets [`recovery_timeout`](Self::recovery_timeout).
    #[inline]
    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    /// Sets [`sequencing_timeout`](Self::sequencing_timeout).
    #[inline]
    pub fn with_sequencing_timeout(mut self, timeout: Duration) -> Self {
        self.sequencing_timeout = timeout;
        self
    }
}
