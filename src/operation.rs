use crate::text::{byte_index, split_at_delta};
use crate::{OperationError, TextDelta, TextPosition};

/// A primitive text operation.
///
/// Operations are immutable values. They're created by the editor
/// integration when the user edits a document, sent to the other
/// participants, [transformed](fn@crate::transform) against concurrent
/// operations and finally applied to the other participants' buffers.
///
/// `Split` is the sequential composition of two operations: the second one
/// is expressed in the coordinates of the document *after* the first one has
/// been applied. Chains of splits are kept right-associative, i.e.
/// `Split(a, Split(b, c))`.
#[derive(Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operation {
    /// Insert some text at a position.
    Insert(TextRun),

    /// Delete the given text, which starts at a position.
    Delete(TextRun),

    /// Apply the first operation, then the second.
    Split(Box<Operation>, Box<Operation>),

    /// Do nothing.
    NoOp,
}

impl core::fmt::Debug for Operation {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::Insert(run) => write!(f, "Insert({:?})", run),
            Self::Delete(run) => write!(f, "Delete({:?})", run),
            Self::Split(first, second) => {
                write!(f, "Split({:?}, {:?})", first, second)
            },
            Self::NoOp => f.write_str("NoOp"),
        }
    }
}

/// A piece of text anchored at a position, together with its precomputed
/// [extent](TextDelta).
#[derive(Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextRun {
    position: TextPosition,
    delta: TextDelta,
    text: String,
}

impl core::fmt::Debug for TextRun {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{:?}, {:?}", self.position, self.text)
    }
}

impl TextRun {
    /// The extent of the text.
    #[inline]
    pub fn delta(&self) -> TextDelta {
        self.delta
    }

    /// The position right after the text.
    #[inline]
    pub fn end(&self) -> TextPosition {
        self.position.advance(self.delta)
    }

    #[inline]
    pub(crate) fn new(position: TextPosition, text: String) -> Self {
        let delta = TextDelta::of(&text);
        Self { position, delta, text }
    }

    /// Where the text starts.
    #[inline]
    pub fn position(&self) -> TextPosition {
        self.position
    }

    /// The text.
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[inline]
    pub(crate) fn with_position(&self, position: TextPosition) -> Self {
        Self { position, delta: self.delta, text: self.text.clone() }
    }

    #[inline]
    fn validate(&self) -> Result<(), OperationError> {
        if self.text.is_empty() {
            return Err(OperationError::EmptyText { at: self.position });
        }

        if self.delta != TextDelta::of(&self.text) {
            return Err(OperationError::DeltaMismatch { at: self.position });
        }

        if self.position.checked_advance(self.delta).is_none() {
            return Err(OperationError::OutOfBounds { at: self.position });
        }

        Ok(())
    }
}

impl Operation {
    /// Applies the operation to `buffer`.
    ///
    /// On error the buffer is left untouched, unless the operation is a
    /// `Split` whose first half already succeeded.
    pub fn apply_to(&self, buffer: &mut String) -> Result<(), OperationError> {
        match self {
            Self::Insert(run) => {
                let idx = byte_index(buffer, run.position)
                    .ok_or(OperationError::OutOfBounds { at: run.position })?;
                buffer.insert_str(idx, &run.text);
            },

            Self::Delete(run) => {
                let idx = byte_index(buffer, run.position)
                    .ok_or(OperationError::OutOfBounds { at: run.position })?;

                if !buffer[idx..].starts_with(run.text.as_str()) {
                    return Err(OperationError::TextMismatch {
                        at: run.position,
                    });
                }

                buffer.replace_range(idx..idx + run.text.len(), "");
            },

            Self::Split(first, second) => {
                first.apply_to(buffer)?;
                second.apply_to(buffer)?;
            },

            Self::NoOp => {},
        }

        Ok(())
    }

    /// Returns the sequential composition of `self` followed by `next`,
    /// merged into a single insertion or deletion when the two are adjacent
    /// and of compatible kinds.
    ///
    /// `next` must be expressed in the coordinates of the document after
    /// `self` has been applied.
    pub fn compose(self, next: Self) -> Self {
        match (self, next) {
            (Self::NoOp, op) | (op, Self::NoOp) => op,

            (Self::Split(first, second), next) => {
                Self::split(*first, (*second).compose(next))
            },

            (Self::Insert(prev), Self::Insert(next)) => {
                match merge_insertions(&prev, &next) {
                    Some(merged) => merged,
                    None => {
                        Self::split(Self::Insert(prev), Self::Insert(next))
                    },
                }
            },

            (Self::Delete(prev), Self::Delete(next)) => {
                match merge_deletions(&prev, &next) {
                    Some(merged) => merged,
                    None => {
                        Self::split(Self::Delete(prev), Self::Delete(next))
                    },
                }
            },

            (Self::Insert(prev), Self::Delete(next)) => {
                match delete_from_insertion(&prev, &next) {
                    Some(merged) => merged,
                    None => {
                        Self::split(Self::Insert(prev), Self::Delete(next))
                    },
                }
            },

            (prev, next) => Self::split(prev, next),
        }
    }

    /// Creates a deletion of `text` starting at `position`.
    ///
    /// Deleting the empty string is a [`NoOp`](Operation::NoOp).
    #[inline]
    pub fn delete<T: Into<String>>(position: TextPosition, text: T) -> Self {
        let text = text.into();
        if text.is_empty() {
            Self::NoOp
        } else {
            Self::Delete(TextRun::new(position, text))
        }
    }

    /// Creates an insertion of `text` at `position`.
    ///
    /// Inserting the empty string is a [`NoOp`](Operation::NoOp).
    #[inline]
    pub fn insert<T: Into<String>>(position: TextPosition, text: T) -> Self {
        let text = text.into();
        if text.is_empty() {
            Self::NoOp
        } else {
            Self::Insert(TextRun::new(position, text))
        }
    }

    /// Returns `true` if applying the operation never changes a document.
    #[inline]
    pub fn is_no_op(&self) -> bool {
        match self {
            Self::NoOp => true,
            Self::Split(first, second) => first.is_no_op() && second.is_no_op(),
            _ => false,
        }
    }

    /// Creates a replacement of `old` with `new` at `position`, expressed as
    /// a deletion followed by an insertion.
    #[inline]
    pub fn replace<O, N>(position: TextPosition, old: O, new: N) -> Self
    where
        O: Into<String>,
        N: Into<String>,
    {
        Self::split(Self::delete(position, old), Self::insert(position, new))
    }

    /// Creates the sequential composition of `first` and `second`, dropping
    /// `NoOp`s and re-associating nested splits to the right.
    #[inline]
    pub fn split(first: Self, second: Self) -> Self {
        match (first, second) {
            (Self::NoOp, op) | (op, Self::NoOp) => op,

            (Self::Split(a, b), c) => Self::split(*a, Self::split(*b, c)),

            (first, second) => Self::Split(Box::new(first), Box::new(second)),
        }
    }

    /// Checks the structural invariants that the constructors guarantee but
    /// a deserialized operation may violate.
    pub fn validate(&self) -> Result<(), OperationError> {
        match self {
            Self::Insert(run) | Self::Delete(run) => run.validate(),

            Self::Split(first, second) => {
                first.validate()?;
                second.validate()
            },

            Self::NoOp => Ok(()),
        }
    }
}

/// `next` is an insertion that lands within (or at either edge of) the text
/// inserted by `prev`.
#[inline]
fn merge_insertions(prev: &TextRun, next: &TextRun) -> Option<Operation> {
    let rel = next.position.delta_from(prev.position)?;
    let (before, after) = split_at_delta(&prev.text, rel)?;
    let text = [before, next.text.as_str(), after].concat();
    Some(Operation::insert(prev.position, text))
}

/// Forward deletions (`next` starts where `prev` started) and backward ones
/// (`next` ends where `prev` started).
#[inline]
fn merge_deletions(prev: &TextRun, next: &TextRun) -> Option<Operation> {
    if next.position == prev.position {
        let text = [prev.text.as_str(), next.text.as_str()].concat();
        Some(Operation::delete(prev.position, text))
    } else if next.end() == prev.position {
        let text = [next.text.as_str(), prev.text.as_str()].concat();
        Some(Operation::delete(next.position, text))
    } else {
        None
    }
}

/// `next` deletes a range fully contained in the text inserted by `prev`.
#[inline]
fn delete_from_insertion(prev: &TextRun, next: &TextRun) -> Option<Operation> {
    let rel_start = next.position.delta_from(prev.position)?;
    let (before, rest) = split_at_delta(&prev.text, rel_start)?;
    let (deleted, after) = split_at_delta(rest, next.delta)?;

    if deleted != next.text {
        return None;
    }

    Some(Operation::insert(prev.position, [before, after].concat()))
}
