//! Base85 text encoding of embedded image buffers
//!
//! Uses the RFC 1924 alphabet and the unpadded short-group rules of
//! Python's `base64.b85encode`/`b85decode`, so tokens produced by Python
//! clients decode bit-for-bit.

use thiserror::Error;

const ALPHABET: &[u8; 85] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz!#$%&()*+-;<=>?@^_`{|}~";

const INVALID: u8 = 0xff;

const DECODE_TABLE: [u8; 256] = {
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Base85Error {
    #[error("bad base85 character at position {0}")]
    InvalidCharacter(usize),

    #[error("base85 overflow in hunk starting at byte {0}")]
    Overflow(usize),
}

/// Encode bytes as base85 text without trailing padding
pub fn encode(input: &[u8]) -> String {
    let padding = (4 - input.len() % 4) % 4;
    let mut out = Vec::with_capacity((input.len() + padding) / 4 * 5);

    for chunk in input.chunks(4) {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        let mut acc = u32::from_be_bytes(word);

        let mut digits = [0u8; 5];
        for digit in digits.iter_mut().rev() {
            *digit = ALPHABET[(acc % 85) as usize];
            acc /= 85;
        }
        out.extend_from_slice(&digits);
    }

    out.truncate(out.len() - padding);
    // Every byte comes from the ASCII alphabet.
    String::from_utf8(out).unwrap_or_default()
}

/// Decode base85 text back into raw bytes
pub fn decode(input: &[u8]) -> Result<Vec<u8>, Base85Error> {
    let padding = (5 - input.len() % 5) % 5;
    let mut out = Vec::with_capacity((input.len() + padding) / 5 * 4);

    for (hunk, chunk) in input.chunks(5).enumerate() {
        let start = hunk * 5;
        let mut acc: u64 = 0;
        for j in 0..5 {
            let value = match chunk.get(j) {
                Some(&c) => match DECODE_TABLE[c as usize] {
                    INVALID => return Err(Base85Error::InvalidCharacter(start + j)),
                    v => v,
                },
                // short final group is padded with the highest digit
                None => 84,
            };
            acc = acc * 85 + u64::from(value);
        }
        let word = u32::try_from(acc).map_err(|_| Base85Error::Overflow(start))?;
        out.extend_from_slice(&word.to_be_bytes());
    }

    out.truncate(out.len() - padding);
    Ok(out)
}
