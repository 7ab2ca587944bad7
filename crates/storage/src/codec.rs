//! Canonical byte encoding of `Entry` and `Batch`.
//!
//! Field order is fixed and never varies by content: timestamp, sequence,
//! action, then four length-prefixed strings, then a length-prefixed
//! previous-hash, then a length-prefixed payload. All integers are
//! little-endian. This is a hand-rolled format, not bincode/serde —
//! the on-disk layout is a durability contract that must stay stable
//! independent of whatever `Entry`'s Rust field order happens to be.

use crate::entry::{Action, Batch, Entry};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("truncated buffer: needed at least {needed} bytes at offset {offset}, had {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("inconsistent batch: declared count {declared} but found {found} entries before buffer end")]
    InconsistentCount { declared: u32, found: u32 },
}

fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    put_u32(buf, bytes.len() as u32);
    buf.extend_from_slice(bytes);
}

fn get_u64(buf: &[u8], offset: &mut usize) -> Result<u64, CodecError> {
    take(buf, offset, 8).map(|b| u64::from_le_bytes(b.try_into().unwrap()))
}

fn get_u32(buf: &[u8], offset: &mut usize) -> Result<u32, CodecError> {
    take(buf, offset, 4).map(|b| u32::from_le_bytes(b.try_into().unwrap()))
}

fn get_u8(buf: &[u8], offset: &mut usize) -> Result<u8, CodecError> {
    take(buf, offset, 1).map(|b| b[0])
}

fn take<'a>(buf: &'a [u8], offset: &mut usize, n: usize) -> Result<&'a [u8], CodecError> {
    if buf.len() < *offset + n {
        return Err(CodecError::Truncated {
            offset: *offset,
            needed: n,
            available: buf.len().saturating_sub(*offset),
        });
    }
    let slice = &buf[*offset..*offset + n];
    *offset += n;
    Ok(slice)
}

fn get_string(buf: &[u8], offset: &mut usize) -> Result<String, CodecError> {
    let len = get_u32(buf, offset)? as usize;
    let bytes = take(buf, offset, len)?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn get_bytes(buf: &[u8], offset: &mut usize) -> Result<Vec<u8>, CodecError> {
    let len = get_u32(buf, offset)? as usize;
    Ok(take(buf, offset, len)?.to_vec())
}

/// Encodes a single entry using the fixed field order described above.
pub fn serialize_entry(entry: &Entry) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64 + entry.payload.len());
    put_u64(&mut buf, entry.timestamp_nanos);
    put_u64(&mut buf, entry.sequence);
    buf.push(entry.action.as_byte());
    put_bytes(&mut buf, entry.key.as_bytes());
    put_bytes(&mut buf, entry.subject.as_bytes());
    put_bytes(&mut buf, entry.controller.as_bytes());
    put_bytes(&mut buf, entry.processor.as_bytes());
    put_bytes(&mut buf, &entry.previous_hash);
    put_bytes(&mut buf, &entry.payload);
    buf
}

/// Decodes a single entry starting at `*offset`, advancing `offset` past it.
pub fn deserialize_entry_at(buf: &[u8], offset: &mut usize) -> Result<Entry, CodecError> {
    let timestamp_nanos = get_u64(buf, offset)?;
    let sequence = get_u64(buf, offset)?;
    let action = Action::from_byte(get_u8(buf, offset)?);
    let key = get_string(buf, offset)?;
    let subject = get_string(buf, offset)?;
    let controller = get_string(buf, offset)?;
    let processor = get_string(buf, offset)?;
    let previous_hash = get_bytes(buf, offset)?;
    let payload = get_bytes(buf, offset)?;
    Ok(Entry {
        timestamp_nanos,
        sequence,
        action,
        key,
        subject,
        controller,
        processor,
        previous_hash,
        payload,
    })
}

pub fn deserialize_entry(buf: &[u8]) -> Result<Entry, CodecError> {
    let mut offset = 0;
    deserialize_entry_at(buf, &mut offset)
}

/// Encodes `[count u32][entry_len u32][entry bytes]*`.
pub fn serialize_batch(batch: &Batch) -> Vec<u8> {
    let mut buf = Vec::new();
    put_u32(&mut buf, batch.entries.len() as u32);
    for entry in &batch.entries {
        let encoded = serialize_entry(entry);
        put_u32(&mut buf, encoded.len() as u32);
        buf.extend_from_slice(&encoded);
    }
    buf
}

/// Decodes a batch previously produced by [`serialize_batch`].
pub fn deserialize_batch(buf: &[u8]) -> Result<Batch, CodecError> {
    let mut offset = 0;
    let declared = get_u32(buf, &mut offset)?;
    let mut entries = Vec::with_capacity(declared as usize);
    for _ in 0..declared {
        let entry_len = get_u32(buf, &mut offset)? as usize;
        let entry_bytes = take(buf, &mut offset, entry_len)?;
        entries.push(deserialize_entry(entry_bytes)?);
    }
    if entries.len() as u32 != declared {
        return Err(CodecError::InconsistentCount {
            declared,
            found: entries.len() as u32,
        });
    }
    Ok(Batch::new(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry(seq: u64) -> Entry {
        Entry::new(seq, Action::Update, "key-123", b"payload bytes".to_vec())
            .with_subject("subject-a")
            .with_controller("controller-b")
            .with_processor("processor-c")
            .with_previous_hash(vec![1, 2, 3, 4])
    }

    #[test]
    fn entry_round_trips() {
        let entry = sample_entry(7);
        let bytes = serialize_entry(&entry);
        let decoded = deserialize_entry(&bytes).unwrap();
        assert_eq!(entry, decoded);
    }

    #[test]
    fn batch_round_trips() {
        let batch = Batch::new(vec![sample_entry(1), sample_entry(2), sample_entry(3)]);
        let bytes = serialize_batch(&batch);
        let decoded = deserialize_batch(&bytes).unwrap();
        assert_eq!(batch, decoded);
    }

    #[test]
    fn empty_batch_round_trips() {
        let batch = Batch::new(vec![]);
        let bytes = serialize_batch(&batch);
        let decoded = deserialize_batch(&bytes).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn truncated_buffer_is_detected() {
        let batch = Batch::new(vec![sample_entry(1)]);
        let mut bytes = serialize_batch(&batch);
        bytes.truncate(bytes.len() - 2);
        let err = deserialize_batch(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }

    #[test]
    fn inconsistent_count_is_detected() {
        let mut buf = Vec::new();
        put_u32(&mut buf, 5); // claims 5 entries
        let entry_bytes = serialize_entry(&sample_entry(1));
        put_u32(&mut buf, entry_bytes.len() as u32);
        buf.extend_from_slice(&entry_bytes);
        // Only one entry actually present; the second read will be Truncated,
        // not InconsistentCount, since the buffer runs out first.
        let err = deserialize_batch(&buf).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }
}
