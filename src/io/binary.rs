//! Base64-wrapped little-endian numeric arrays.
//!
//! Waveforms (`yvals`) are packed `f32` and mask lists (`bad`) are packed `i32`.
//! The payload text may be wrapped across lines, so ASCII whitespace is stripped
//! before decoding.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::DecodeError;

const WIDTH: usize = 4;

fn decode_words(text: &str) -> Result<Vec<[u8; WIDTH]>, DecodeError> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(compact.as_bytes())?;
    if bytes.len() % WIDTH != 0 {
        return Err(DecodeError::Misaligned {
            len: bytes.len(),
            width: WIDTH,
        });
    }

    Ok(bytes
        .chunks_exact(WIDTH)
        .map(|chunk| [chunk[0], chunk[1], chunk[2], chunk[3]])
        .collect())
}

/// Decode a packed `f32` array, widening to `f64`.
pub fn decode_f32_array(text: &str) -> Result<Vec<f64>, DecodeError> {
    Ok(decode_words(text)?
        .into_iter()
        .map(|w| f32::from_le_bytes(w) as f64)
        .collect())
}

pub fn decode_i32_array(text: &str) -> Result<Vec<i32>, DecodeError> {
    Ok(decode_words(text)?.into_iter().map(i32::from_le_bytes).collect())
}

/// Encode values as a packed `f32` array (precision is narrowed).
pub fn encode_f32_array(values: &[f64]) -> String {
    let bytes: Vec<u8> = values
        .iter()
        .flat_map(|&v| (v as f32).to_le_bytes())
        .collect();
    STANDARD.encode(bytes)
}

pub fn encode_i32_array(values: &[i32]) -> String {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    STANDARD.encode(bytes)
}
