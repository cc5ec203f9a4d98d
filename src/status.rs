//! Acceptable-status checks.

use http::StatusCode;

/// The status assumed when a request lists no acceptable statuses.
pub const DEFAULT_STATUS: StatusCode = StatusCode::OK;

/// Returns `true` if `actual` is one of the `allowed` statuses.
///
/// An empty `allowed` list means `200 OK` only. Matching is exact; a `201`
/// is rejected unless it is listed.
///
/// # Examples
///
/// ```
/// use http::StatusCode;
/// use stratus::status::accepts;
///
/// assert!(accepts(StatusCode::OK, &[]));
/// assert!(!accepts(StatusCode::CREATED, &[]));
/// assert!(accepts(StatusCode::CREATED, &[StatusCode::ACCEPTED, StatusCode::CREATED]));
/// ```
pub fn accepts(actual: StatusCode, allowed: &[StatusCode]) -> bool {
    if allowed.is_empty() {
        return actual == DEFAULT_STATUS;
    }
    allowed.contains(&actual)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_allow_list_only_accepts_ok() {
        assert!(accepts(StatusCode::OK, &[]));
        assert!(!accepts(StatusCode::CREATED, &[]));
        assert!(!accepts(StatusCode::NO_CONTENT, &[]));
        assert!(!accepts(StatusCode::NOT_FOUND, &[]));
    }

    #[test]
    fn test_explicit_list_is_exact() {
        let allowed = [StatusCode::NO_CONTENT];
        assert!(accepts(StatusCode::NO_CONTENT, &allowed));
        // OK is no longer implied once a list is given
        assert!(!accepts(StatusCode::OK, &allowed));
    }
}
