//! Decoder for the Base64 form in which the command travels on the command
//! line.
//!
//! The decoder tolerates line breaks and spaces inside the encoded text, so a
//! supervisor can pass wrapped output from an encoder without cleaning it up.

use crate::error::{LaunchError, Result};

const INVALID: u8 = 0xff;
const PAD: u8 = 0xfe;
const SKIP: u8 = 0xfd;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

static DECODE_MAP: [u8; 256] = decode_map();

const fn decode_map() -> [u8; 256] {
    let mut map = [INVALID; 256];
    let mut i = 0;
    while i < ALPHABET.len() {
        map[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    map[b'=' as usize] = PAD;
    map[b'\n' as usize] = SKIP;
    map[b'\r' as usize] = SKIP;
    map[b' ' as usize] = SKIP;
    map
}

/// Upper bound on the decoded size of `len` encoded bytes.
pub fn decoded_capacity(len: usize) -> usize {
    len / 4 * 3
}

/// Decode `input` into `output`, returning the number of bytes written.
///
/// `input.len()` must be a multiple of 4 and `output` must hold at least
/// [`decoded_capacity`] bytes; both are checked before anything is written.
/// Within a block only the last two symbols may be `=`, and each pad
/// withholds one byte of that block. No data may follow a padded block.
pub fn decode_base64(input: &[u8], output: &mut [u8]) -> Result<usize> {
    if input.len() % 4 != 0 {
        return Err(LaunchError::InvalidLength { len: input.len() });
    }
    let needed = decoded_capacity(input.len());
    if output.len() < needed {
        return Err(LaunchError::OutputTooSmall {
            needed,
            capacity: output.len(),
        });
    }

    let mut block: u32 = 0;
    let mut symbols = 0;
    let mut pads = 0;
    let mut finished = false;
    let mut written = 0;

    for (offset, &byte) in input.iter().enumerate() {
        let invalid = || LaunchError::InvalidEncoding { offset, byte };
        let sextet = match DECODE_MAP[byte as usize] {
            SKIP => continue,
            INVALID => return Err(invalid()),
            PAD => {
                if symbols < 2 {
                    return Err(invalid());
                }
                pads += 1;
                0
            }
            value => {
                if pads > 0 || finished {
                    return Err(invalid());
                }
                value
            }
        };

        block = (block << 6) | u32::from(sextet);
        symbols += 1;
        if symbols == 4 {
            let bytes = [(block >> 16) as u8, (block >> 8) as u8, block as u8];
            let keep = 3 - pads;
            output[written..written + keep].copy_from_slice(&bytes[..keep]);
            written += keep;
            finished = pads > 0;
            block = 0;
            symbols = 0;
            pads = 0;
        }
    }

    if symbols != 0 {
        return Err(LaunchError::IncompleteBlock { symbols });
    }
    Ok(written)
}

/// Decode an encoded command into a freshly allocated buffer.
pub fn decode_command(encoded: &str) -> Result<Vec<u8>> {
    let input = encoded.as_bytes();
    let capacity = decoded_capacity(input.len());

    let mut raw = Vec::new();
    raw.try_reserve_exact(capacity)
        .map_err(|_| LaunchError::Allocation(capacity))?;
    raw.resize(capacity, 0);

    let len = decode_base64(input, &mut raw)?;
    raw.truncate(len);
    Ok(raw)
}
