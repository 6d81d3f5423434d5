//! Run-length schemes used by sprite payloads.
//!
//! Two incompatible encodings exist:
//!
//! * the generic scheme used by RLE sprites and atlas sub-sprites: a stream of
//!   `(count, value)` pairs where a zero count escapes to a literal block;
//! * the "triplet" scheme used by full-screen wallpapers: a zero byte
//!   introduces `(count, value)`, every other byte is a literal pixel.
//!
//! Both decoders are lenient about the end of input: a truncated pair or
//! triplet ends the stream and the caller pads the result to size.

/// Longest run a single pair can describe.
pub const MAX_RUN: usize = 255;

/// Decode a generic RLE stream, stopping once `limit` bytes are produced.
pub fn decode_rle(src: &[u8], limit: usize) -> Vec<u8> {
    let mut ret = Vec::with_capacity(limit.min(src.len().saturating_mul(MAX_RUN)));
    let mut iter = src.iter().copied();

    while ret.len() < limit {
        let Some(count) = iter.next() else { break };
        match count {
            // Literal escape: length byte then raw bytes
            0 => {
                let Some(n) = iter.next() else { break };
                for _ in 0..n {
                    match iter.next() {
                        Some(b) => ret.push(b),
                        None => break,
                    }
                }
            }
            n => {
                let Some(value) = iter.next() else { break };
                ret.extend(std::iter::repeat_n(value, usize::from(n)));
            }
        }
    }
    ret.truncate(limit);
    ret
}

/// Encode `pixels` as one `(count, value)` pair per maximal run.
pub fn encode_rle(pixels: &[u8]) -> Vec<u8> {
    let mut ret = Vec::new();
    let mut i = 0;
    while i < pixels.len() {
        let value = pixels[i];
        let run = pixels[i..]
            .iter()
            .take(MAX_RUN)
            .take_while(|&&p| p == value)
            .count();
        ret.push(run as u8);
        ret.push(value);
        i += run;
    }
    ret
}

/// Decode a wallpaper triplet stream, stopping once `limit` bytes are produced.
pub fn decode_triplet_rle(src: &[u8], limit: usize) -> Vec<u8> {
    let mut ret = Vec::with_capacity(limit);
    let mut iter = src.iter().copied();

    while ret.len() < limit {
        match iter.next() {
            None => break,
            Some(0) => {
                let (Some(count), Some(value)) = (iter.next(), iter.next()) else {
                    break;
                };
                ret.extend(std::iter::repeat_n(value, usize::from(count)));
            }
            Some(literal) => ret.push(literal),
        }
    }
    ret.truncate(limit);
    ret
}

/// Pads with zeros or truncates so the buffer is exactly `len` bytes.
pub fn fit_to_length(mut data: Vec<u8>, len: usize) -> Vec<u8> {
    data.resize(len, 0);
    data
}
