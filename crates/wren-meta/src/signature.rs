//! Parameterized identifier derivation.
//!
//! A generic instantiation's identifier is derived from its type signature
//! string, hashed in RFC 4122 version-5 form under the well-known
//! parameterized-type namespace. Equal signatures therefore produce
//! bitwise-equal identifiers in every run and every process.
//!
//! The signature grammar itself lives in the registry (it needs definition
//! lookups); this module owns the hashing. No crate in the dependency
//! stack provides SHA-1, and the derived values are fixed by the external
//! algorithm, so a compact implementation lives here with known-vector
//! tests.

use wren_abi::Guid;

/// Namespace identifier under which parameterized type signatures are
/// hashed
pub const PARAMETERIZED_NAMESPACE: Guid =
    Guid::new(0x11F47AD5, 0x7B73, 0x42C0, 0xABAE, 0x878B1E16ADEE);

/// Derive the identifier for a parameterized instantiation from its
/// signature string.
pub fn parameterized_guid(signature: &str) -> Guid {
    let mut input = Vec::with_capacity(16 + signature.len());
    input.extend_from_slice(&PARAMETERIZED_NAMESPACE.to_bytes());
    input.extend_from_slice(signature.as_bytes());
    let digest = sha1(&input);

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    // RFC 4122: version 5 in the high nibble of octet 6, variant 10 in the
    // top bits of octet 8.
    bytes[6] = (bytes[6] & 0x0F) | 0x50;
    bytes[8] = (bytes[8] & 0x3F) | 0x80;
    Guid::from_bytes(bytes)
}

/// SHA-1 digest (FIPS 180-1)
fn sha1(data: &[u8]) -> [u8; 20] {
    let mut state: [u32; 5] = [0x6745_2301, 0xEFCD_AB89, 0x98BA_DCFE, 0x1032_5476, 0xC3D2_E1F0];

    // Pad to a 512-bit boundary: 0x80, zeros, 64-bit big-endian bit length.
    let bit_length = (data.len() as u64).wrapping_mul(8);
    let mut message = data.to_vec();
    message.push(0x80);
    while message.len() % 64 != 56 {
        message.push(0);
    }
    message.extend_from_slice(&bit_length.to_be_bytes());

    for block in message.chunks_exact(64) {
        let mut schedule = [0u32; 80];
        for (i, word) in schedule.iter_mut().take(16).enumerate() {
            *word = u32::from_be_bytes([
                block[4 * i],
                block[4 * i + 1],
                block[4 * i + 2],
                block[4 * i + 3],
            ]);
        }
        for i in 16..80 {
            schedule[i] = (schedule[i - 3] ^ schedule[i - 8] ^ schedule[i - 14]
                ^ schedule[i - 16])
                .rotate_left(1);
        }

        let [mut a, mut b, mut c, mut d, mut e] = state;
        for (i, word) in schedule.iter().enumerate() {
            let (f, k) = match i {
                0..=19 => ((b & c) | (!b & d), 0x5A82_7999),
                20..=39 => (b ^ c ^ d, 0x6ED9_EBA1),
                40..=59 => ((b & c) | (b & d) | (c & d), 0x8F1B_BCDC),
                _ => (b ^ c ^ d, 0xCA62_C1D6),
            };
            let temp = a
                .rotate_left(5)
                .wrapping_add(f)
                .wrapping_add(e)
                .wrapping_add(k)
                .wrapping_add(*word);
            e = d;
            d = c;
            c = b;
            b = a.rotate_left(30);
            a = temp;
        }

        state[0] = state[0].wrapping_add(a);
        state[1] = state[1].wrapping_add(b);
        state[2] = state[2].wrapping_add(c);
        state[3] = state[3].wrapping_add(d);
        state[4] = state[4].wrapping_add(e);
    }

    let mut digest = [0u8; 20];
    for (i, word) in state.iter().enumerate() {
        digest[4 * i..4 * i + 4].copy_from_slice(&word.to_be_bytes());
    }
    digest
}
