//! Short printable tokens for DOM-visible diagram ids.

use uuid::Uuid;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Prefix shared by every generated diagram container id.
pub const ID_PREFIX: &str = "mermaid-";

/// A random lowercase-alphanumeric token of the given length.
///
/// Tokens only need to be unique enough to avoid id collisions within a
/// single sandbox page; each render runs in its own page, so collisions
/// across renders are immaterial.
pub fn token(length: usize) -> String {
    let mut out = String::with_capacity(length);
    while out.len() < length {
        for byte in Uuid::new_v4().into_bytes() {
            if out.len() == length {
                break;
            }
            out.push(char::from(ALPHABET[usize::from(byte) % ALPHABET.len()]));
        }
    }
    out
}

/// A fresh container id for one rendered diagram.
pub fn container_id() -> String {
    format!("{ID_PREFIX}{}", token(7))
}
