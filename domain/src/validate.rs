//! Resource locator grammar checks. Keep logic minimal and deterministic.
//!
//! A valid path is either the root `/` or one or more `/segment` parts where
//! each segment is lowercase ASCII alphanumerics joined by single hyphens.

use crate::CoreError;

/// Path of the webspace homepage.
pub const ROOT_PATH: &str = "/";

/// Whether `c` may appear inside a path segment.
pub(crate) fn is_segment_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment.starts_with('-')
        && !segment.ends_with('-')
        && !segment.contains("--")
        && segment.chars().all(is_segment_char)
}

/// True iff `path` already conforms to the resource locator grammar.
pub fn is_valid_path(path: &str) -> bool {
    if path == ROOT_PATH {
        return true;
    }
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };
    rest.split('/').all(is_valid_segment)
}

/// Validate `path`, describing the first violation found.
pub fn validate_path(path: &str) -> Result<(), CoreError> {
    if path.is_empty() {
        return Err(CoreError::ResourceLocatorNotValid("empty".into()));
    }
    if !path.starts_with('/') {
        return Err(CoreError::ResourceLocatorNotValid(format!(
            "{path}: must start with /"
        )));
    }
    if path != ROOT_PATH && path.ends_with('/') {
        return Err(CoreError::ResourceLocatorNotValid(format!(
            "{path}: trailing slash"
        )));
    }
    if !is_valid_path(path) {
        return Err(CoreError::ResourceLocatorNotValid(format!(
            "{path}: only lowercase letters, digits and single hyphens are allowed"
        )));
    }
    Ok(())
}
