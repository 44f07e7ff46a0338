//! Content digests used as entry identity.

use sha2::{Digest, Sha256};

/// Hex characters kept from the SHA-256 digest for an entry hash.
pub const ENTRY_HASH_LENGTH: usize = 10;

/// Written between field values so `("ab", "")` and `("a", "b")` differ.
const FIELD_SEPARATOR: &[u8] = b"\x1f";

/// Truncated SHA-256 of an entry's printable field values, in order.
pub fn entry_digest<'a, I>(values: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut hasher = Sha256::new();
    for (i, value) in values.into_iter().enumerate() {
        if i > 0 {
            hasher.update(FIELD_SEPARATOR);
        }
        hasher.update(value.as_bytes());
    }
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(ENTRY_HASH_LENGTH);
    digest
}
