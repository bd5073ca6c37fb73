//! Tree path assembly.

use crate::validate::ROOT_PATH;

/// Builds child paths from a parent path and a cleaned segment.
#[derive(Clone, Copy, Debug, Default)]
pub struct TreeGenerator;

impl TreeGenerator {
    /// Final segment of `path`; empty for the root.
    pub fn child_part(path: &str) -> &str {
        let trimmed = path.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(idx) => &trimmed[idx + 1..],
            None => trimmed,
        }
    }

    /// `parent` and `child` joined by exactly one `/`.
    ///
    /// `child` may itself be a cleaned path (`/mae-chines`) or carry several
    /// segments; surrounding slashes are dropped before joining.
    pub fn join(parent: &str, child: &str) -> String {
        let parent = parent.trim_end_matches('/');
        let child = child.trim_matches('/');
        match (parent.is_empty(), child.is_empty()) {
            (true, true) => ROOT_PATH.to_string(),
            (true, false) => format!("/{child}"),
            (false, true) => parent.to_string(),
            (false, false) => format!("{parent}/{child}"),
        }
    }

    /// Re-root `path` from under `old_parent` to under `new_parent`.
    ///
    /// Keeps every segment below `old_parent` verbatim; when `path` does not
    /// sit below `old_parent` only its last segment is carried over.
    pub fn rebase(path: &str, old_parent: &str, new_parent: &str) -> String {
        let prefix = old_parent.trim_end_matches('/');
        match path.strip_prefix(prefix) {
            Some(rest) if rest.starts_with('/') => Self::join(new_parent, rest),
            _ => Self::join(new_parent, Self::child_part(path)),
        }
    }
}
