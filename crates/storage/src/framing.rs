//! On-disk frame layout for a segment file: a concatenation of
//! length-prefixed frames, each holding one transformed batch.
//!
//! Plain frame: `[len u32][raw bytes]`.
//! Encrypted frame: `[iv 12 bytes][ciphertext_len u32][ciphertext][16-byte GCM tag]`.
//!
//! The IV prefix is not optional even though a terse reading of the
//! frame layout might omit it: without it stored alongside the
//! ciphertext, decryption has no way to recover the nonce used to
//! produce it. `aes-gcm`'s `encrypt` call returns ciphertext with the
//! tag already appended; `ciphertext_len` is that combined length minus
//! the fixed 16-byte tag, so a reader can always find the tag boundary.

pub const GCM_TAG_LEN: usize = 16;
pub const GCM_IV_LEN: usize = 12;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FramingError {
    #[error("truncated frame at offset {offset}: needed {needed} bytes, had {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
}

/// A decoded frame's payload, before compression/encryption are undone.
#[derive(Debug, PartialEq, Eq)]
pub enum FramePayload<'a> {
    Plain(&'a [u8]),
    Encrypted {
        iv: &'a [u8],
        ciphertext_and_tag: &'a [u8],
    },
}

pub fn frame_plain(raw: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + raw.len());
    buf.extend_from_slice(&(raw.len() as u32).to_le_bytes());
    buf.extend_from_slice(raw);
    buf
}

/// `ciphertext_and_tag` is the direct output of an AEAD encrypt call
/// (ciphertext with the tag appended); `iv` is the nonce used to produce it.
pub fn frame_encrypted(iv: &[u8; GCM_IV_LEN], ciphertext_and_tag: &[u8]) -> Vec<u8> {
    assert!(
        ciphertext_and_tag.len() >= GCM_TAG_LEN,
        "ciphertext shorter than one GCM tag"
    );
    let ciphertext_len = ciphertext_and_tag.len() - GCM_TAG_LEN;
    let mut buf = Vec::with_capacity(GCM_IV_LEN + 4 + ciphertext_and_tag.len());
    buf.extend_from_slice(iv);
    buf.extend_from_slice(&(ciphertext_len as u32).to_le_bytes());
    buf.extend_from_slice(ciphertext_and_tag);
    buf
}

/// Sequentially decodes frames out of a segment buffer. `encrypted` must
/// match how the segment was written — the two frame layouts are not
/// self-describing, the same way a stream's encryption setting is fixed
/// at construction rather than per-frame.
pub struct FrameReader<'a> {
    buf: &'a [u8],
    offset: usize,
    encrypted: bool,
}

impl<'a> FrameReader<'a> {
    pub fn new(buf: &'a [u8], encrypted: bool) -> Self {
        Self {
            buf,
            offset: 0,
            encrypted,
        }
    }

    fn next_plain(&mut self) -> Option<Result<FramePayload<'a>, FramingError>> {
        if self.offset + 4 > self.buf.len() {
            return None;
        }
        let len = self.read_u32_at(self.offset);
        let payload_start = self.offset + 4;
        if payload_start + len > self.buf.len() {
            return Some(Err(FramingError::Truncated {
                offset: self.offset,
                needed: len,
                available: self.buf.len() - payload_start,
            }));
        }
        let payload = &self.buf[payload_start..payload_start + len];
        self.offset = payload_start + len;
        Some(Ok(FramePayload::Plain(payload)))
    }

    fn next_encrypted(&mut self) -> Option<Result<FramePayload<'a>, FramingError>> {
        if self.offset + GCM_IV_LEN + 4 > self.buf.len() {
            return None;
        }
        let iv = &self.buf[self.offset..self.offset + GCM_IV_LEN];
        let len_offset = self.offset + GCM_IV_LEN;
        let ciphertext_len = self.read_u32_at(len_offset);
        let ciphertext_start = len_offset + 4;
        let combined_len = ciphertext_len + GCM_TAG_LEN;
        if ciphertext_start + combined_len > self.buf.len() {
            return Some(Err(FramingError::Truncated {
                offset: self.offset,
                needed: combined_len,
                available: self.buf.len() - ciphertext_start,
            }));
        }
        let ciphertext_and_tag = &self.buf[ciphertext_start..ciphertext_start + combined_len];
        self.offset = ciphertext_start + combined_len;
        Some(Ok(FramePayload::Encrypted { iv, ciphertext_and_tag }))
    }

    fn read_u32_at(&self, offset: usize) -> usize {
        let bytes: [u8; 4] = self.buf[offset..offset + 4].try_into().unwrap();
        u32::from_le_bytes(bytes) as usize
    }
}

impl<'a> Iterator for FrameReader<'a> {
    type Item = Result<FramePayload<'a>, FramingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.buf.len() {
            return None;
        }
        if self.encrypted {
            self.next_encrypted()
        } else {
            self.next_plain()
        }
    }
}
