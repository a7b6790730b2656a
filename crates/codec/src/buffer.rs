//! Growable buffer used to reassemble a frame's blocks into one payload.

use crate::error::{CodecError, Result};
use bytes::Bytes;

/// Initial capacity of a reassembly buffer.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Capacity above which the buffer is released after a payload is taken.
pub const RETAIN_LIMIT: usize = 128 * 1024;

/// Amortized-doubling byte buffer with a hard size limit.
///
/// Block lengths come off the network, so growth is explicit: the storage
/// doubles, or jumps straight to the needed size when doubling is not enough,
/// and never past `limit`.
#[derive(Debug)]
pub struct ReassemblyBuffer {
    storage: Box<[u8]>,
    len: usize,
    limit: usize,
}

impl ReassemblyBuffer {
    /// Create an empty buffer that refuses to grow past `limit` bytes.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            storage: vec![0; DEFAULT_CAPACITY.min(limit)].into_boxed_slice(),
            len: 0,
            limit,
        }
    }

    /// Number of bytes currently held.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current allocated capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Maximum number of bytes the buffer will ever hold.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// The bytes written so far.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.storage[..self.len]
    }

    /// Make room for `additional` more bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::FrameTooLarge`] if the buffer would exceed its
    /// limit.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let needed = self
            .len
            .checked_add(additional)
            .filter(|needed| *needed <= self.limit)
            .ok_or(CodecError::FrameTooLarge {
                size: self.len.saturating_add(additional),
                max: self.limit,
            })?;

        if needed > self.storage.len() {
            let capacity = self
                .storage
                .len()
                .saturating_mul(2)
                .max(needed)
                .min(self.limit);
            let mut storage = vec![0; capacity].into_boxed_slice();
            storage[..self.len].copy_from_slice(&self.storage[..self.len]);
            self.storage = storage;
        }

        Ok(())
    }

    /// Append `data`, growing if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::FrameTooLarge`] if the buffer would exceed its
    /// limit.
    pub fn extend_from_slice(&mut self, data: &[u8]) -> Result<()> {
        self.reserve(data.len())?;
        self.storage[self.len..self.len + data.len()].copy_from_slice(data);
        self.len += data.len();
        Ok(())
    }

    /// Discard the contents, keeping the allocation.
    pub const fn clear(&mut self) {
        self.len = 0;
    }

    /// Take the contents out as an immutable payload and reset.
    pub fn take(&mut self) -> Bytes {
        let payload = Bytes::copy_from_slice(self.as_slice());
        self.len = 0;

        if self.storage.len() > RETAIN_LIMIT {
            self.storage = vec![0; DEFAULT_CAPACITY.min(self.limit)].into_boxed_slice();
        }

        payload
    }
}
