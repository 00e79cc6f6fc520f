use std::collections::HashMap;

use parking_lot::Mutex;

use crate::{BufferError, DocumentPath, Operation, OperationError};

/// The document buffers the session edits, as seen by this crate.
///
/// This is the seam to the editor integration. The methods take `&self`
/// because one collaborator is shared by every document actor of a session:
/// implementations are expected to use interior mutability, and must
/// tolerate concurrent calls for *different* paths. Calls for the same path
/// are always serialized by that document's actor.
pub trait DocumentBuffers: Send + Sync + 'static {
    /// Applies a remote operation to the buffer of `path`.
    fn apply_operation(
        &self,
        path: &DocumentPath,
        operation: &Operation,
    ) -> Result<(), BufferError>;

    /// Returns the current content of `path`, or `None` if no buffer is
    /// open for it.
    fn current_content(&self, path: &DocumentPath) -> Option<String>;

    /// Drops the buffer of `path`.
    fn remove(&self, path: &DocumentPath);

    /// Replaces the whole content of `path`, opening a buffer for it if
    /// there isn't one.
    fn replace_content(&self, path: &DocumentPath, content: String);
}

/// A text buffer held in memory.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    content: String,
}

impl core::fmt::Debug for TextBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        self.content.fmt(f)
    }
}

impl From<String> for TextBuffer {
    #[inline]
    fn from(content: String) -> Self {
        Self { content }
    }
}

impl From<&str> for TextBuffer {
    #[inline]
    fn from(content: &str) -> Self {
        content.to_owned().into()
    }
}

impl TextBuffer {
    /// Applies `operation` to the buffer, leaving it untouched on error.
    #[inline]
    pub fn apply(
        &mut self,
        operation: &Operation,
    ) -> Result<(), OperationError> {
        let mut edited = self.content.clone();
        operation.apply_to(&mut edited)?;
        self.content = edited;
        Ok(())
    }

    /// The buffer's content.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.content
    }
}

/// A [`DocumentBuffers`] implementation keeping every buffer in memory.
///
/// Useful in tests, and on a host that has no editor attached.
#[derive(Debug, Default)]
pub struct MemoryBuffers {
    buffers: Mutex<HashMap<DocumentPath, TextBuffer>>,
}

impl MemoryBuffers {
    /// Applies a local edit to the buffer of `path`.
    ///
    /// This is what an editor does before reporting the edit to
    /// [`Session::local_edit_occurred`](crate::Session::local_edit_occurred).
    #[inline]
    pub fn edit(
        &self,
        path: &DocumentPath,
        operation: &Operation,
    ) -> Result<(), BufferError> {
        self.apply_operation(path, operation)
    }

    /// Creates a new, empty set of buffers.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the paths of every open buffer, sorted.
    pub fn paths(&self) -> Vec<DocumentPath> {
        let mut paths =
            self.buffers.lock().keys().cloned().collect::<Vec<_>>();
        paths.sort();
        paths
    }
}

impl DocumentBuffers for MemoryBuffers {
    fn apply_operation(
        &self,
        path: &DocumentPath,
        operation: &Operation,
    ) -> Result<(), BufferError> {
        let mut buffers = self.buffers.lock();

        let buffer = buffers
            .get_mut(path)
            .ok_or_else(|| BufferError::NotOpen(path.clone()))?;

        buffer.apply(operation).map_err(|source| BufferError::Apply {
            path: path.clone(),
            source,
        })
    }

    #[inline]
    fn current_content(&self, path: &DocumentPath) -> Option<String> {
        self.buffers.lock().get(path).map(|buf| buf.as_str().to_owned())
    }

    #[inline]
    fn remove(&self, path: &DocumentPath) {
        self.buffers.lock().remove(path);
    }

    #[inline]
    fn replace_content(&self, path: &DocumentPath, content: String) {
        self.buffers.lock().insert(path.clone(), content.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TextPosition;

    #[test]
    fn failed_operations_leave_the_buffer_untouched() {
        let buffers = MemoryBuffers::new();
        let path = DocumentPath::from("a.txt");

        buffers.replace_content(&path, "abc".into());

        // The first half of the split succeeds, the second one doesn't.
        let op = Operation::split(
            Operation::insert(TextPosition::new(0, 0), "x"),
            Operation::delete(TextPosition::new(0, 1), "zzz"),
        );

        assert!(matches!(
            buffers.apply_operation(&path, &op),
            Err(BufferError::Apply { .. })
        ));
        assert_eq!(buffers.current_content(&path).as_deref(), Some("abc"));
    }

    #[test]
    fn edits_need_an_open_buffer() {
        let buffers = MemoryBuffers::new();
        let path = DocumentPath::from("a.txt");
        let op = Operation::insert(TextPosition::ZERO, "a");

        assert_eq!(
            buffers.edit(&path, &op),
            Err(BufferError::NotOpen(path.clone()))
        );
    }
}
