use crate::{DocumentPath, ParticipantId, Permission, TextPosition};

/// Where a participant's selection is.
///
/// `anchor` is where the selection started and `head` is where the cursor
/// is, so `head` may come before `anchor`. An empty selection is a plain
/// cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextSelectionActivity {
    source: ParticipantId,
    path: DocumentPath,
    anchor: TextPosition,
    head: TextPosition,
}

impl TextSelectionActivity {
    /// Creates a new selection activity.
    #[inline]
    pub fn new(
        source: ParticipantId,
        path: DocumentPath,
        anchor: TextPosition,
        head: TextPosition,
    ) -> Self {
        Self { source, path, anchor, head }
    }

    /// Where the selection started.
    #[inline]
    pub fn anchor(&self) -> TextPosition {
        self.anchor
    }

    /// Where the cursor is.
    #[inline]
    pub fn head(&self) -> TextPosition {
        self.head
    }

    /// The document.
    #[inline]
    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    /// Whose selection it is.
    #[inline]
    pub fn source(&self) -> ParticipantId {
        self.source
    }

    #[inline]
    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if self.path.is_valid() {
            Ok(())
        } else {
            Err("invalid document path")
        }
    }
}

/// The range of lines a participant is looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViewportActivity {
    source: ParticipantId,
    path: DocumentPath,
    start_line: u32,
    line_count: u32,
}

impl ViewportActivity {
    /// Creates a new viewport activity.
    #[inline]
    pub fn new(
        source: ParticipantId,
        path: DocumentPath,
        start_line: u32,
        line_count: u32,
    ) -> Self {
        Self { source, path, start_line, line_count }
    }

    /// The number of visible lines.
    #[inline]
    pub fn line_count(&self) -> u32 {
        self.line_count
    }

    /// The document.
    #[inline]
    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    /// Whose viewport it is.
    #[inline]
    pub fn source(&self) -> ParticipantId {
        self.source
    }

    /// The first visible line.
    #[inline]
    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    #[inline]
    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if !self.path.is_valid() {
            return Err("invalid document path");
        }
        if self.start_line.checked_add(self.line_count).is_none() {
            return Err("viewport overflows");
        }
        Ok(())
    }
}

/// A change of a participant's permission, issued by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PermissionActivity {
    source: ParticipantId,
    target: ParticipantId,
    permission: Permission,
}

impl PermissionActivity {
    /// Creates a new permission activity.
    #[inline]
    pub fn new(
        source: ParticipantId,
        target: ParticipantId,
        permission: Permission,
    ) -> Self {
        Self { source, target, permission }
    }

    /// The new permission.
    #[inline]
    pub fn permission(&self) -> Permission {
        self.permission
    }

    /// Who changed it.
    #[inline]
    pub fn source(&self) -> ParticipantId {
        self.source
    }

    /// Whose permission changed.
    #[inline]
    pub fn target(&self) -> ParticipantId {
        self.target
    }
}
