use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};

/// Entropy drawn for a session id, in bytes.
pub const SESSION_ID_BYTES: usize = 32;

/// Generates a URL-safe session id from 32 bytes of OS randomness, encoded
/// without padding.
pub fn generate_session_id() -> String {
    generate_session_id_with_len(SESSION_ID_BYTES)
}

/// Same as [`generate_session_id`] with an explicit entropy length.
pub fn generate_session_id_with_len(num_bytes: usize) -> String {
    let mut bytes = vec![0u8; num_bytes];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
