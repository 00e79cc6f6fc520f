use core::cmp::Ordering;

/// A position in a text document, expressed as a zero-based line number and
/// a zero-based offset within that line.
///
/// Offsets are counted in Unicode scalar values (i.e. `char`s), which all
/// the participants of a session must agree on.
///
/// Positions are ordered first by line and then by offset, which is the
/// order in which they appear in the document.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextPosition {
    line: u32,
    offset: u32,
}

impl core::fmt::Debug for TextPosition {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}:{}", self.line, self.offset)
    }
}

impl PartialOrd for TextPosition {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TextPosition {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.line.cmp(&other.line).then(self.offset.cmp(&other.offset))
    }
}

impl TextPosition {
    /// The start of the document.
    pub const ZERO: Self = Self { line: 0, offset: 0 };

    /// Creates a new position.
    #[inline]
    pub const fn new(line: u32, offset: u32) -> Self {
        Self { line, offset }
    }

    /// The zero-based line number.
    #[inline]
    pub const fn line(&self) -> u32 {
        self.line
    }

    /// The zero-based offset within the line.
    #[inline]
    pub const fn offset(&self) -> u32 {
        self.offset
    }

    /// Returns the position reached by moving over a piece of text whose
    /// extent is `delta`, starting at `self`.
    ///
    /// Saturates at `u32::MAX`; see
    /// [`checked_advance`](Self::checked_advance).
    #[inline]
    pub fn advance(self, delta: TextDelta) -> Self {
        if delta.lines == 0 {
            Self {
                line: self.line,
                offset: self.offset.saturating_add(delta.offset),
            }
        } else {
            Self {
                line: self.line.saturating_add(delta.lines),
                offset: delta.offset,
            }
        }
    }

    /// Like [`advance`](Self::advance), but returns `None` if the resulting
    /// position can't be represented.
    #[inline]
    pub fn checked_advance(self, delta: TextDelta) -> Option<Self> {
        if delta.lines == 0 {
            let offset = self.offset.checked_add(delta.offset)?;
            Some(Self { line: self.line, offset })
        } else {
            let line = self.line.checked_add(delta.lines)?;
            Some(Self { line, offset: delta.offset })
        }
    }

    /// Returns the extent of the text between `origin` and `self`, or `None`
    /// if `origin` comes after `self`.
    #[inline]
    pub fn delta_from(self, origin: Self) -> Option<TextDelta> {
        match self.line.cmp(&origin.line) {
            Ordering::Less => None,

            Ordering::Equal => {
                let offset = self.offset.checked_sub(origin.offset)?;
                Some(TextDelta { lines: 0, offset })
            },

            Ordering::Greater => Some(TextDelta {
                lines: self.line - origin.line,
                offset: self.offset,
            }),
        }
    }

    /// Interprets this position as the extent of the text between the start
    /// of the document and `self`.
    #[inline]
    pub fn as_delta(self) -> TextDelta {
        TextDelta { lines: self.line, offset: self.offset }
    }
}

/// The extent of a piece of text: the number of line breaks it contains and
/// the number of characters following the last one (or the total number of
/// characters if it doesn't contain any line break).
///
/// Deltas are stored alongside the text of every operation so that the
/// transformation functions never have to re-scan the text.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextDelta {
    lines: u32,
    offset: u32,
}

impl core::fmt::Debug for TextDelta {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "+{}:{}", self.lines, self.offset)
    }
}

impl TextDelta {
    /// The extent of the empty string.
    pub const ZERO: Self = Self { lines: 0, offset: 0 };

    /// Creates a new delta.
    #[inline]
    pub const fn new(lines: u32, offset: u32) -> Self {
        Self { lines, offset }
    }

    /// Computes the extent of `text`.
    #[inline]
    pub fn of(text: &str) -> Self {
        match text.rfind('\n') {
            Some(last_newline) => Self {
                lines: text.matches('\n').count() as u32,
                offset: text[last_newline + 1..].chars().count() as u32,
            },

            None => Self { lines: 0, offset: text.chars().count() as u32 },
        }
    }

    /// Returns `true` if this is the extent of the empty string.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lines == 0 && self.offset == 0
    }

    /// The number of line breaks.
    #[inline]
    pub const fn lines(&self) -> u32 {
        self.lines
    }

    /// The number of characters after the last line break.
    #[inline]
    pub const fn offset(&self) -> u32 {
        self.offset
    }

    /// Returns the extent of the concatenation of a text whose extent is
    /// `self` and one whose extent is `next`.
    #[inline]
    pub fn then(self, next: Self) -> Self {
        TextPosition::ZERO.advance(self).advance(next).as_delta()
    }
}

/// Splits `text` at the point that's `delta` away from its start.
///
/// Returns `None` if that point lies past the end of `text`, or if the
/// offset part of `delta` would cross a line break.
#[inline]
pub(crate) fn split_at_delta(
    text: &str,
    delta: TextDelta,
) -> Option<(&str, &str)> {
    let mut line_start = 0;

    for _ in 0..delta.lines {
        line_start += text[line_start..].find('\n')? + 1;
    }

    let rest = &text[line_start..];

    let mut byte_offset = 0;

    let mut chars = rest.char_indices();

    for _ in 0..delta.offset {
        let (idx, ch) = chars.next()?;
        if ch == '\n' {
            return None;
        }
        byte_offset = idx + ch.len_utf8();
    }

    Some(text.split_at(line_start + byte_offset))
}

/// Returns the byte index in `text` corresponding to `position`.
#[inline]
pub(crate) fn byte_index(text: &str, position: TextPosition) -> Option<usize> {
    split_at_delta(text, position.as_delta()).map(|(before, _)| before.len())
}
