use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = timetable_common::id::prefixed_ulid("ws");
/// assert!(id.starts_with("ws_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Well-known ID prefixes.
pub mod prefix {
    /// Live WebSocket subscriber.
    pub const CONNECTION: &str = "ws";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_ulid_format() {
        let id = prefixed_ulid(prefix::CONNECTION);
        assert!(id.starts_with("ws_"));
        // ULID is 26 chars, plus prefix + underscore
        assert_eq!(id.len(), 3 + 26);
    }

    #[test]
    fn test_uniqueness() {
        let a = prefixed_ulid(prefix::CONNECTION);
        let b = prefixed_ulid(prefix::CONNECTION);
        assert_ne!(a, b);
    }
}
