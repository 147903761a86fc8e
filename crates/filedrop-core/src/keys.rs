//! Random names and secrets.

use rand::Rng;

const DELETE_KEY_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const BARENAME_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

pub const DELETE_KEY_LEN: usize = 30;
pub const BARENAME_LEN: usize = 8;

fn random_string(len: usize, alphabet: &[u8]) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
        .collect()
}

/// Delete key handed out when the uploader did not choose one.
pub fn generate_delete_key() -> String {
    random_string(DELETE_KEY_LEN, DELETE_KEY_CHARS)
}

/// Random lowercase alphanumeric barename.
pub fn generate_barename() -> String {
    random_string(BARENAME_LEN, BARENAME_CHARS)
}
