//! UUID v7 utilities for time-ordered identifiers.
//!
//! Every record id in skilltree is a UUIDv7, so ids sort in creation order.

use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_v7_version() {
        assert_eq!(new_v7().get_version_num(), 7);
    }

    #[test]
    fn test_v7_ids_are_time_ordered() {
        let a = new_v7();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = new_v7();
        assert!(a < b);
    }
}
