//! # Paths
//!
//! Paths are normalised textually before any node is consulted: empty
//! components and `.` are dropped and `..` removes the previous component
//! (never climbing above the start). Symlinks are not followed.

use crate::{NAME_MAX, NodeType, VfsNode};
use core::fmt;
use log::trace;

/// Longest accepted path in bytes, exclusive.
pub const PATH_MAX: usize = 512;

/// Most components a normalised path can hold.
pub const MAX_COMPONENTS: usize = PATH_MAX / 2;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path is longer than {} bytes", PATH_MAX)]
    TooLong,
    #[error("path component is longer than {} bytes", NAME_MAX)]
    NameTooLong,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError<E> {
    #[error("invalid path: {0}")]
    Path(#[from] PathError),
    #[error("no such file or directory")]
    NotFound,
    #[error("not a directory")]
    NotADirectory,
    #[error("filesystem error: {0}")]
    Node(E),
}

/// A normalised path borrowing its components from the input string.
#[derive(Clone)]
pub struct NormalizedPath<'a> {
    absolute: bool,
    parts: [&'a str; MAX_COMPONENTS],
    len: usize,
}

impl<'a> NormalizedPath<'a> {
    #[must_use]
    pub const fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Whether no components remain (`/` or `.`).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn components(&self) -> &[&'a str] {
        &self.parts[..self.len]
    }

    /// The last component, if any.
    #[must_use]
    pub fn file_name(&self) -> Option<&'a str> {
        self.components().last().copied()
    }
}

impl fmt::Display for NormalizedPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str(if self.absolute { "/" } else { "." });
        }
        for (i, part) in self.components().iter().enumerate() {
            if i > 0 || self.absolute {
                f.write_str("/")?;
            }
            f.write_str(part)?;
        }
        Ok(())
    }
}

impl fmt::Debug for NormalizedPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NormalizedPath({self})")
    }
}

/// Normalise `path`.
///
/// An empty path is the root.
///
/// # Errors
/// [`PathError::TooLong`] if `path` is [`PATH_MAX`] bytes or longer,
/// [`PathError::NameTooLong`] for a component over [`NAME_MAX`] bytes.
pub fn normalize(path: &str) -> Result<NormalizedPath<'_>, PathError> {
    if path.len() >= PATH_MAX {
        return Err(PathError::TooLong);
    }

    let mut normalized = NormalizedPath {
        absolute: path.is_empty() || path.starts_with('/'),
        parts: [""; MAX_COMPONENTS],
        len: 0,
    };

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => normalized.len = normalized.len.saturating_sub(1),
            name if name.len() > NAME_MAX => return Err(PathError::NameTooLong),
            name => {
                // a path shorter than PATH_MAX cannot hold more components
                normalized.parts[normalized.len] = name;
                normalized.len += 1;
            }
        }
    }

    Ok(normalized)
}

/// Resolve `path` starting at `root`.
///
/// Absolute and relative paths are both taken relative to `root`.
///
/// # Errors
/// - [`LookupError::Path`] for malformed paths.
/// - [`LookupError::NotADirectory`] if an intermediate node is not a directory.
/// - [`LookupError::NotFound`] if a component does not exist.
/// - [`LookupError::Node`] for filesystem errors.
pub fn lookup<N: VfsNode + Clone>(root: &N, path: &str) -> Result<N, LookupError<N::Error>> {
    let path = normalize(path)?;
    trace!("Looking up {path}");

    let mut node = root.clone();
    for name in path.components() {
        if node.metadata().node_type != NodeType::Directory {
            return Err(LookupError::NotADirectory);
        }
        node = node
            .finddir(name.as_bytes())
            .map_err(LookupError::Node)?
            .ok_or(LookupError::NotFound)?;
    }
    Ok(node)
}
