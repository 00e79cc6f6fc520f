//! The messages exchanged between the participants of a session.
//!
//! Every activity is an immutable value created through its constructor.
//! Activities reconstructed from the wire bypass those constructors, which
//! is why [`Activity::validate`] exists: an activity that fails it is
//! dropped without ever being applied.

mod awareness;
mod consistency;
mod edit;
mod file;

pub use awareness::{
    PermissionActivity,
    TextSelectionActivity,
    ViewportActivity,
};
pub use consistency::{ChecksumActivity, ChecksumErrorActivity, RecoveryId};
pub use edit::{EditActivity, JupiterActivity};
pub use file::{
    FileActivity,
    FileChange,
    FolderActivity,
    FolderChange,
    Purpose,
};

use crate::{DocumentPath, ParticipantId};

/// Any message exchanged between participants.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Activity {
    /// A local, unstamped edit.
    Edit(EditActivity),

    /// An operation stamped for a peer-pair.
    Jupiter(JupiterActivity),

    /// A selection change.
    TextSelection(TextSelectionActivity),

    /// A viewport change.
    Viewport(ViewportActivity),

    /// A whole-file change.
    File(FileActivity),

    /// A folder change.
    Folder(FolderActivity),

    /// A permission change.
    Permission(PermissionActivity),

    /// The host's checksum of a document.
    Checksum(ChecksumActivity),

    /// A peer's report of a checksum mismatch.
    ChecksumError(ChecksumErrorActivity),
}

/// A handler with one method per kind of [`Activity`].
///
/// Every method does nothing by default, so implementors only have to
/// override the ones they care about. Use [`Activity::dispatch`] to route an
/// activity to the right method.
#[allow(unused_variables)]
pub trait ActivityReceiver {
    /// Handles an [`EditActivity`].
    fn receive_edit(&mut self, activity: &EditActivity) {}

    /// Handles a [`JupiterActivity`].
    fn receive_jupiter(&mut self, activity: &JupiterActivity) {}

    /// Handles a [`TextSelectionActivity`].
    fn receive_text_selection(&mut self, activity: &TextSelectionActivity) {}

    /// Handles a [`ViewportActivity`].
    fn receive_viewport(&mut self, activity: &ViewportActivity) {}

    /// Handles a [`FileActivity`].
    fn receive_file(&mut self, activity: &FileActivity) {}

    /// Handles a [`FolderActivity`].
    fn receive_folder(&mut self, activity: &FolderActivity) {}

    /// Handles a [`PermissionActivity`].
    fn receive_permission(&mut self, activity: &PermissionActivity) {}

    /// Handles a [`ChecksumActivity`].
    fn receive_checksum(&mut self, activity: &ChecksumActivity) {}

    /// Handles a [`ChecksumErrorActivity`].
    fn receive_checksum_error(&mut self, activity: &ChecksumErrorActivity) {}
}

/// The kind of an [`Activity`], without its payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    /// [`Activity::Edit`].
    Edit,
    /// [`Activity::Jupiter`].
    Jupiter,
    /// [`Activity::TextSelection`].
    TextSelection,
    /// [`Activity::Viewport`].
    Viewport,
    /// [`Activity::File`].
    File,
    /// [`Activity::Folder`].
    Folder,
    /// [`Activity::Permission`].
    Permission,
    /// [`Activity::Checksum`].
    Checksum,
    /// [`Activity::ChecksumError`].
    ChecksumError,
}

impl Activity {
    /// Routes the activity to the method of `receiver` handling its kind.
    #[inline]
    pub fn dispatch<R: ActivityReceiver + ?Sized>(&self, receiver: &mut R) {
        match self {
            Self::Edit(a) => receiver.receive_edit(a),
            Self::Jupiter(a) => receiver.receive_jupiter(a),
            Self::TextSelection(a) => receiver.receive_text_selection(a),
            Self::Viewport(a) => receiver.receive_viewport(a),
            Self::File(a) => receiver.receive_file(a),
            Self::Folder(a) => receiver.receive_folder(a),
            Self::Permission(a) => receiver.receive_permission(a),
            Self::Checksum(a) => receiver.receive_checksum(a),
            Self::ChecksumError(a) => receiver.receive_checksum_error(a),
        }
    }

    /// Returns `true` if the activity passes [`validate`](Self::validate).
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// The activity's kind.
    #[inline]
    pub fn kind(&self) -> ActivityKind {
        match self {
            Self::Edit(_) => ActivityKind::Edit,
            Self::Jupiter(_) => ActivityKind::Jupiter,
            Self::TextSelection(_) => ActivityKind::TextSelection,
            Self::Viewport(_) => ActivityKind::Viewport,
            Self::File(_) => ActivityKind::File,
            Self::Folder(_) => ActivityKind::Folder,
            Self::Permission(_) => ActivityKind::Permission,
            Self::Checksum(_) => ActivityKind::Checksum,
            Self::ChecksumError(_) => ActivityKind::ChecksumError,
        }
    }

    /// The document (or folder) the activity is about, if any.
    ///
    /// For a [`ChecksumErrorActivity`] naming several documents this is
    /// `None`.
    #[inline]
    pub fn path(&self) -> Option<&DocumentPath> {
        match self {
            Self::Edit(a) => Some(a.path()),
            Self::Jupiter(a) => Some(a.path()),
            Self::TextSelection(a) => Some(a.path()),
            Self::Viewport(a) => Some(a.path()),
            Self::File(a) => Some(a.path()),
            Self::Folder(a) => Some(a.path()),
            Self::Checksum(a) => Some(a.path()),
            Self::Permission(_) | Self::ChecksumError(_) => None,
        }
    }

    /// The participant the activity originates from.
    #[inline]
    pub fn source(&self) -> ParticipantId {
        match self {
            Self::Edit(a) => a.source(),
            Self::Jupiter(a) => a.source(),
            Self::TextSelection(a) => a.source(),
            Self::Viewport(a) => a.source(),
            Self::File(a) => a.source(),
            Self::Folder(a) => a.source(),
            Self::Permission(a) => a.source(),
            Self::Checksum(a) => a.source(),
            Self::ChecksumError(a) => a.source(),
        }
    }

    /// The participant the activity is addressed to, for the kinds that
    /// have one.
    #[inline]
    pub fn target(&self) -> Option<ParticipantId> {
        match self {
            Self::Permission(a) => Some(a.target()),
            Self::ChecksumError(a) => Some(a.target()),
            _ => None,
        }
    }

    /// Checks the invariants the constructors guarantee, returning a short
    /// description of the first violated one.
    #[inline]
    pub fn validate(&self) -> Result<(), &'static str> {
        match self {
            Self::Edit(a) => a.validate(),
            Self::Jupiter(a) => a.validate(),
            Self::TextSelection(a) => a.validate(),
            Self::Viewport(a) => a.validate(),
            Self::File(a) => a.validate(),
            Self::Folder(a) => a.validate(),
            Self::Permission(_) => Ok(()),
            Self::Checksum(a) => a.validate(),
            Self::ChecksumError(a) => a.validate(),
        }
    }
}

macro_rules! impl_from {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Activity {
                #[inline]
                fn from(activity: $ty) -> Self {
                    Self::$variant(activity)
                }
            }
        )*
    };
}

impl_from!(
    Edit(EditActivity),
    Jupiter(JupiterActivity),
    TextSelection(TextSelectionActivity),
    Viewport(ViewportActivity),
    File(FileActivity),
    Folder(FolderActivity),
    Permission(PermissionActivity),
    Checksum(ChecksumActivity),
    ChecksumError(ChecksumErrorActivity),
);
