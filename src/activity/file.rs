use crate::{DocumentPath, ParticipantId, RecoveryId};

/// What happened to a file.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FileChange {
    /// The file was created, or its content replaced wholesale.
    Created,

    /// The file was removed.
    Removed,

    /// The file was moved from `old_path` to `path`.
    Moved,
}

/// Why a [`FileActivity`] was sent.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Purpose {
    /// A regular change made by a participant.
    Activity,

    /// A full-content replacement sent by the host to repair a divergence.
    Recovery,
}

/// A whole-file change.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileActivity {
    source: ParticipantId,
    path: DocumentPath,
    old_path: Option<DocumentPath>,
    change: FileChange,
    purpose: Purpose,
    content: Option<String>,
    encoding: Option<String>,
    recovery_id: Option<RecoveryId>,
    #[cfg_attr(feature = "serde", serde(default))]
    generation: u32,
}

impl FileActivity {
    /// A file was created with the given content.
    #[inline]
    pub fn created(
        source: ParticipantId,
        path: DocumentPath,
        content: String,
    ) -> Self {
        Self {
            source,
            path,
            old_path: None,
            change: FileChange::Created,
            purpose: Purpose::Activity,
            content: Some(content),
            encoding: Some("UTF-8".to_owned()),
            recovery_id: None,
            generation: 0,
        }
    }

    /// A file was moved.
    #[inline]
    pub fn moved(
        source: ParticipantId,
        old_path: DocumentPath,
        new_path: DocumentPath,
    ) -> Self {
        Self {
            source,
            path: new_path,
            old_path: Some(old_path),
            change: FileChange::Moved,
            purpose: Purpose::Activity,
            content: None,
            encoding: None,
            recovery_id: None,
            generation: 0,
        }
    }

    /// A file was removed.
    #[inline]
    pub fn removed(source: ParticipantId, path: DocumentPath) -> Self {
        Self {
            source,
            path,
            old_path: None,
            change: FileChange::Removed,
            purpose: Purpose::Activity,
            content: None,
            encoding: None,
            recovery_id: None,
            generation: 0,
        }
    }

    /// The host's authoritative content of `path`, sent to answer the
    /// recovery request `recovery_id`.
    #[inline]
    pub fn recovery(
        source: ParticipantId,
        path: DocumentPath,
        content: String,
        recovery_id: RecoveryId,
    ) -> Self {
        Self {
            source,
            path,
            old_path: None,
            change: FileChange::Created,
            purpose: Purpose::Recovery,
            content: Some(content),
            encoding: Some("UTF-8".to_owned()),
            recovery_id: Some(recovery_id),
            generation: 0,
        }
    }

    /// What happened to the file.
    #[inline]
    pub fn change(&self) -> FileChange {
        self.change
    }

    /// The file's new content, for creations and recoveries.
    #[inline]
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// The name of the content's encoding.
    #[inline]
    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    /// The generation the recipient's Jupiter state restarts from, for
    /// recoveries.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// The file's previous path, for moves.
    #[inline]
    pub fn old_path(&self) -> Option<&DocumentPath> {
        self.old_path.as_ref()
    }

    /// The file's path (its new path, for moves).
    #[inline]
    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    /// Why the activity was sent.
    #[inline]
    pub fn purpose(&self) -> Purpose {
        self.purpose
    }

    /// The recovery this activity answers, for recoveries.
    #[inline]
    pub fn recovery_id(&self) -> Option<RecoveryId> {
        self.recovery_id
    }

    /// Who changed the file.
    #[inline]
    pub fn source(&self) -> ParticipantId {
        self.source
    }

    #[inline]
    pub(crate) fn with_generation(mut self, generation: u32) -> Self {
        self.generation = generation;
        self
    }

    #[inline]
    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if !self.path.is_valid() {
            return Err("invalid document path");
        }

        match self.change {
            FileChange::Created if self.content.is_none() => {
                return Err("file creation without content");
            },

            FileChange::Moved => match &self.old_path {
                Some(old_path) if old_path.is_valid() => {},
                _ => return Err("file move without a valid old path"),
            },

            FileChange::Removed if self.content.is_some() => {
                return Err("file removal with content");
            },

            _ => {},
        }

        match (self.purpose, self.change, self.recovery_id) {
            (Purpose::Recovery, FileChange::Created, Some(_)) => Ok(()),
            (Purpose::Recovery, _, _) => Err("malformed recovery"),
            (Purpose::Activity, _, Some(_)) => {
                Err("recovery id outside of a recovery")
            },
            (Purpose::Activity, _, None) => Ok(()),
        }
    }
}

/// What happened to a folder.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FolderChange {
    /// The folder was created.
    Created,

    /// The folder was removed.
    Removed,
}

/// A folder was created or removed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FolderActivity {
    source: ParticipantId,
    path: DocumentPath,
    change: FolderChange,
}

impl FolderActivity {
    /// Creates a new folder activity.
    #[inline]
    pub fn new(
        source: ParticipantId,
        path: DocumentPath,
        change: FolderChange,
    ) -> Self {
        Self { source, path, change }
    }

    /// What happened to the folder.
    #[inline]
    pub fn change(&self) -> FolderChange {
        self.change
    }

    /// The folder.
    #[inline]
    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    /// Who changed it.
    #[inline]
    pub fn source(&self) -> ParticipantId {
        self.source
    }

    #[inline]
    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if self.path.is_valid() {
            Ok(())
        } else {
            Err("invalid folder path")
        }
    }
}
