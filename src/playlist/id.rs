use md5::{Digest, Md5};

/// Length of a channel id, in hex characters
pub const ID_LEN: usize = 16;

/// Derives a channel id from its stream URL
///
/// The id is the first [`ID_LEN`] hex characters of the MD5 digest of the URL
/// bytes. No collision detection happens; ids are already handed out to
/// clients, so the length stays as is.
#[must_use]
pub fn derive(url: &str) -> String {
    let mut id = format!("{:x}", Md5::digest(url.as_bytes()));
    id.truncate(ID_LEN);
    id
}
