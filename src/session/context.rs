use parking_lot::RwLock;

use crate::{ParticipantId, ParticipantIdMap, Permission};

/// Who's in a session, and what they're allowed to do.
///
/// This is the only state shared by every document actor of a session. It's
/// read on every inbound edit and written only when participants join, leave
/// or change permission.
#[derive(Debug)]
pub struct SessionContext {
    local: ParticipantId,
    host: ParticipantId,
    participants: RwLock<ParticipantIdMap<Permission>>,
}

impl SessionContext {
    /// Adds a participant to the session, or changes the permission of one
    /// that's already in it.
    #[inline]
    pub fn add_participant(&self, id: ParticipantId, permission: Permission) {
        self.participants.write().insert(id, permission);
    }

    /// Returns `true` if `id` is in the session and may edit documents.
    #[inline]
    pub fn can_write(&self, id: ParticipantId) -> bool {
        self.permission(id) == Some(Permission::Write)
    }

    /// The host of the session.
    #[inline]
    pub fn host(&self) -> ParticipantId {
        self.host
    }

    /// Returns `true` if the local participant hosts the session.
    #[inline]
    pub fn is_host(&self) -> bool {
        self.local == self.host
    }

    /// The local participant.
    #[inline]
    pub fn local(&self) -> ParticipantId {
        self.local
    }

    /// Creates the context of a session hosted by `host`, as seen by
    /// `local`. Both start with [`Permission::Write`].
    pub fn new(local: ParticipantId, host: ParticipantId) -> Self {
        let mut participants = ParticipantIdMap::default();
        participants.insert(local, Permission::Write);
        participants.insert(host, Permission::Write);
        Self { local, host, participants: RwLock::new(participants) }
    }

    /// Every participant other than the local one, sorted by id.
    pub fn others(&self) -> Vec<ParticipantId> {
        let mut others = self
            .participants
            .read()
            .keys()
            .copied()
            .filter(|&id| id != self.local)
            .collect::<Vec<_>>();
        others.sort();
        others
    }

    /// The permission of `id`, or `None` if it isn't in the session.
    #[inline]
    pub fn permission(&self, id: ParticipantId) -> Option<Permission> {
        self.participants.read().get(&id).copied()
    }

    /// Removes a participant from the session, returning `true` if it was
    /// in it.
    ///
    /// The host and the local participant can't be removed.
    #[inline]
    pub fn remove_participant(&self, id: ParticipantId) -> bool {
        if id == self.host || id == self.local {
            return false;
        }
        self.participants.write().remove(&id).is_some()
    }
}
