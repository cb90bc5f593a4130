//! Cryptographically secure alphanumeric tokens
//!
//! Bytes come from the thread-local CSPRNG (reseeded from the OS). Bytes at
//! or above the largest multiple of 62 are rejected so every character of
//! [`ALPHABET`] is equally likely.

use rand::RngExt;

use crate::constants::ALPHABET;

/// 248 = 4 * 62; bytes in 248..=255 would bias the first 8 characters.
const REJECT_FROM: u8 = (256 / ALPHABET.len() * ALPHABET.len()) as u8;

/// Draw `length` independent, uniformly distributed characters from
/// `[A-Za-z0-9]`.
pub fn generate(length: usize) -> String {
    let mut rng = rand::rng();
    let mut out = String::with_capacity(length);
    let mut buf = [0u8; 64];

    while out.len() < length {
        rng.fill(&mut buf);
        for &byte in buf.iter().filter(|&&b| b < REJECT_FROM) {
            out.push(char::from(ALPHABET[usize::from(byte) % ALPHABET.len()]));
            if out.len() == length {
                break;
            }
        }
    }

    out
}
