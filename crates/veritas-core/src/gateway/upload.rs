//! Size-bounded upload buffer

use crate::error::{DetectionError, Result};

/// In-memory upload that refuses to grow past `limit` bytes
///
/// The transport pushes body chunks as they arrive, so an oversize upload is
/// rejected as soon as it crosses the limit, without reading the rest.
#[derive(Debug)]
pub struct UploadBuffer {
    bytes: Vec<u8>,
    received: usize,
    limit: usize,
}

impl UploadBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            received: 0,
            limit,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Result<()> {
        self.received = self.received.saturating_add(chunk.len());
        if self.received > self.limit {
            self.bytes = Vec::new();
            return Err(DetectionError::PayloadTooLarge {
                size: self.received,
                limit: self.limit,
            });
        }
        self.bytes.extend_from_slice(chunk);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_up_to_limit() {
        let mut buffer = UploadBuffer::new(8);
        buffer.push(b"abcd").unwrap();
        buffer.push(b"efgh").unwrap();
        assert_eq!(buffer.len(), 8);
        assert_eq!(buffer.into_bytes(), b"abcdefgh");
    }

    #[test]
    fn test_rejects_past_limit() {
        let mut buffer = UploadBuffer::new(8);
        buffer.push(b"abcdef").unwrap();
        let err = buffer.push(b"ghi").unwrap_err();
        assert_eq!(err, DetectionError::PayloadTooLarge { size: 9, limit: 8 });
        assert!(buffer.is_empty());
    }
}
