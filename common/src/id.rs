//! Resource id generation.
//!
//! IDs are ULIDs: opaque, lexicographically sortable strings whose ordering
//! approximates creation order without a round-trip to the store.

use ulid::Ulid;

/// Generates a new, lowercase-hyphenless opaque resource id.
pub fn new_id() -> String {
    Ulid::new().to_string()
}
