use integer_encoding::VarInt;

/// Encodes a strictly ascending list of FileIds as a varint delta sequence
/// (§4.1): the first id is encoded as-is, each subsequent id as the
/// difference from its predecessor.
pub fn encode_deltas(ids: &[u32]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut prev: u32 = 0;
    for &id in ids {
        let delta = id - prev;
        out.extend_from_slice(&delta.encode_var_vec());
        prev = id;
    }
    out
}

/// A lazy decoder over a varint delta-encoded posting list, decoding ids
/// one at a time without materializing the whole list.
pub struct DeltaDecoder<'a> {
    buf: &'a [u8],
    offset: usize,
    prev: u32,
}

impl<'a> DeltaDecoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        DeltaDecoder {
            buf,
            offset: 0,
            prev: 0,
        }
    }
}

impl<'a> Iterator for DeltaDecoder<'a> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.offset >= self.buf.len() {
            return None;
        }
        let (delta, read) = u32::decode_var(&self.buf[self.offset..])?;
        self.offset += read;
        self.prev += delta;
        Some(self.prev)
    }
}

/// Collects a full posting list. Prefer [`DeltaDecoder`] directly for
/// merge operations so lists are never fully materialized.
pub fn decode_deltas(buf: &[u8]) -> Vec<u32> {
    DeltaDecoder::new(buf).collect()
}
