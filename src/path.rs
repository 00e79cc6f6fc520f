use std::sync::Arc;

/// The path of a shared document, relative to the root of the shared
/// project.
///
/// Paths are compared verbatim: normalizing them (separators, case, etc.) is
/// the job of whoever creates them.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct DocumentPath(Arc<str>);

impl core::fmt::Debug for DocumentPath {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl core::fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl DocumentPath {
    /// Returns the path as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub(crate) fn is_valid(&self) -> bool {
        !self.0.is_empty() && !self.0.contains('\0')
    }
}

impl From<&str> for DocumentPath {
    #[inline]
    fn from(path: &str) -> Self {
        Self(path.into())
    }
}

impl From<String> for DocumentPath {
    #[inline]
    fn from(path: String) -> Self {
        Self(path.into())
    }
}

impl AsRef<str> for DocumentPath {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}
