//! Checks for caller-supplied names that get joined onto a base directory

/// `true` when `name` is exactly one path component: non-empty, free of
/// separators and NUL, and not `.` or `..`
#[must_use]
pub fn is_single_segment(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
