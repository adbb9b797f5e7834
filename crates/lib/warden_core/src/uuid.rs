// Refresh token rows use UUIDv7 so they sort by issue time; user ids stay on
// PG's gen_random_uuid() (v4).

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuidv7_is_valid() {
        let id = uuidv7();
        assert_eq!(id.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn uuidv7_ids_are_distinct_and_ordered() {
        let ids: Vec<Uuid> = (0..16).map(|_| uuidv7()).collect();
        for pair in ids.windows(2) {
            assert_ne!(pair[0], pair[1]);
            assert!(pair[1] >= pair[0]);
        }
    }
}
