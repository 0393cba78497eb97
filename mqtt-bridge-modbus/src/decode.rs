//! IEEE-754 float32 reconstruction from Modbus register pairs.
//!
//! The transmitters serve each float as two consecutive 16-bit holding
//! registers with the bytes of each register in little order and the
//! registers themselves in big order (the "mid-little" or 3412 layout).
//! This is neither plain big-endian nor plain little-endian, so it cannot
//! be expressed with a single endianness flag.

use crate::link::{ReadError, RegisterSource};

/// Decode a float32 from two consecutive holding registers.
///
/// `pair[0]` carries the most significant word; both registers are
/// byte-swapped before the words are joined. Plain big-endian would be
/// `pair[0] << 16 | pair[1]`.
pub fn decode_float32(pair: [u16; 2]) -> f32 {
    let bits = (u32::from(pair[0].swap_bytes()) << 16) | u32::from(pair[1].swap_bytes());
    f32::from_bits(bits)
}

/// Inverse of [`decode_float32`]: the register pair a transmitter would
/// serve for `value`.
pub fn encode_float32(value: f32) -> [u16; 2] {
    let bits = value.to_bits();
    [((bits >> 16) as u16).swap_bytes(), (bits as u16).swap_bytes()]
}

/// Read one float32 measurement starting at `address`.
///
/// Reads exactly two consecutive holding registers through `source` and
/// decodes them. A failed read is returned to the caller, which degrades
/// the field to unavailable; it never aborts the surrounding cycle.
pub async fn read_float32<S: RegisterSource>(
    source: &mut S,
    address: u16,
) -> Result<f32, ReadError> {
    let pair = source.read_pair(address).await?;
    Ok(decode_float32(pair))
}
