//! Position/limit/mark view over a fixed byte region.
//!
//! A [`SeqBuffer`] never grows. Writers fill it from `position` up to
//! `limit`, [`SeqBuffer::flip`] turns what was written into a readable view,
//! and readers consume it from `position` up to the new `limit`.
//!
//! Invariant after every operation: `0 <= mark <= position <= limit <= capacity`.
//! Operations that would break it fail and leave the buffer unchanged.

use std::fmt;

use crate::error::{Result, WireError};

/// Default capacity for command and reply buffers.
pub const DEFAULT_BUFFER_SIZE: usize = 256;

/// A bounded byte buffer with `position`, `limit` and `mark` cursors.
///
/// The backing store is any byte region: an owned `Box<[u8]>` (the default),
/// a fixed array, or a caller-supplied `&mut [u8]`.
pub struct SeqBuffer<S = Box<[u8]>> {
    store: S,
    position: usize,
    limit: usize,
    mark: usize,
}

impl SeqBuffer<Box<[u8]>> {
    /// Allocate a zeroed buffer of `capacity` bytes, ready for writing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::wrap(vec![0u8; capacity].into_boxed_slice())
    }

    /// Copy `data` into a new buffer positioned for reading it.
    pub fn from_slice(data: &[u8]) -> Self {
        let mut buf = Self::with_capacity(data.len());
        buf.store.copy_from_slice(data);
        buf.position = 0;
        buf
    }
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> SeqBuffer<S> {
    /// Wrap `store` as an empty buffer in write mode.
    pub fn wrap(store: S) -> Self {
        let limit = store.as_ref().len();
        Self {
            store,
            position: 0,
            limit,
            mark: 0,
        }
    }

    /// Wrap `store` whose first `len` bytes already hold data, ready for reading.
    pub fn wrap_filled(store: S, len: usize) -> Result<Self> {
        let capacity = store.as_ref().len();
        if len > capacity {
            return Err(WireError::OutOfBounds {
                requested: len,
                bound: capacity,
            });
        }
        Ok(Self {
            store,
            position: 0,
            limit: len,
            mark: 0,
        })
    }

    /// Give back the backing store.
    pub fn into_inner(self) -> S {
        self.store
    }

    pub fn capacity(&self) -> usize {
        self.store.as_ref().len()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// The saved mark (0 when none was set).
    pub fn mark_position(&self) -> usize {
        self.mark
    }

    /// Bytes between `position` and `limit`.
    pub fn remaining(&self) -> usize {
        self.limit - self.position
    }

    pub fn has_remaining(&self) -> bool {
        self.position < self.limit
    }

    /// Move `position`. Fails past `limit`. A mark beyond the new position is dropped.
    pub fn set_position(&mut self, position: usize) -> Result<()> {
        if position > self.limit {
            return Err(WireError::OutOfBounds {
                requested: position,
                bound: self.limit,
            });
        }
        self.position = position;
        if self.mark > position {
            self.mark = 0;
        }
        Ok(())
    }

    /// Put `position` back where an earlier call left it, clamped to `limit`.
    ///
    /// Infallible form of [`set_position`](Self::set_position) for undoing a
    /// partial put or get. A mark beyond the new position is dropped.
    pub fn restore_position(&mut self, position: usize) -> &mut Self {
        self.position = position.min(self.limit);
        if self.mark > self.position {
            self.mark = 0;
        }
        self
    }

    /// Move `limit`. Fails past capacity; pulls `position` and `mark` back if needed.
    pub fn set_limit(&mut self, limit: usize) -> Result<()> {
        if limit > self.capacity() {
            return Err(WireError::OutOfBounds {
                requested: limit,
                bound: self.capacity(),
            });
        }
        self.limit = limit;
        if self.position > limit {
            self.position = limit;
        }
        if self.mark > self.position {
            self.mark = 0;
        }
        Ok(())
    }

    /// Skip `n` bytes without reading or writing them.
    pub fn advance(&mut self, n: usize) -> Result<()> {
        if n > self.remaining() {
            return Err(WireError::OutOfBounds {
                requested: self.position.saturating_add(n),
                bound: self.limit,
            });
        }
        self.position += n;
        Ok(())
    }

    // ----- element I/O -----

    /// Write one byte at `position`.
    pub fn put_u8(&mut self, value: u8) -> Result<()> {
        if self.position == self.limit {
            return Err(WireError::BufferOverflow {
                needed: 1,
                remaining: 0,
            });
        }
        self.store.as_mut()[self.position] = value;
        self.position += 1;
        Ok(())
    }

    /// Write all of `src`, or nothing.
    pub fn put_slice(&mut self, src: &[u8]) -> Result<()> {
        if src.len() > self.remaining() {
            return Err(WireError::BufferOverflow {
                needed: src.len(),
                remaining: self.remaining(),
            });
        }
        let end = self.position + src.len();
        self.store.as_mut()[self.position..end].copy_from_slice(src);
        self.position = end;
        Ok(())
    }

    /// Read one byte at `position`.
    pub fn get_u8(&mut self) -> Result<u8> {
        if self.position == self.limit {
            return Err(WireError::BufferUnderflow {
                needed: 1,
                remaining: 0,
            });
        }
        let value = self.store.as_ref()[self.position];
        self.position += 1;
        Ok(value)
    }

    /// Fill all of `dst`, or read nothing.
    pub fn get_slice(&mut self, dst: &mut [u8]) -> Result<()> {
        if dst.len() > self.remaining() {
            return Err(WireError::BufferUnderflow {
                needed: dst.len(),
                remaining: self.remaining(),
            });
        }
        let end = self.position + dst.len();
        dst.copy_from_slice(&self.store.as_ref()[self.position..end]);
        self.position = end;
        Ok(())
    }

    // ----- cursor management -----

    /// Save the current position.
    pub fn mark(&mut self) -> &mut Self {
        self.mark = self.position;
        self
    }

    /// Return to the saved mark.
    pub fn reset(&mut self) -> &mut Self {
        self.position = self.mark;
        self
    }

    /// Position and mark back to the start; limit unchanged.
    pub fn rewind(&mut self) -> &mut Self {
        self.position = 0;
        self.mark = 0;
        self
    }

    /// Empty the buffer for writing from scratch.
    pub fn clear(&mut self) -> &mut Self {
        self.position = 0;
        self.mark = 0;
        self.limit = self.capacity();
        self
    }

    /// Empty the buffer for writing exactly `len` bytes.
    pub fn clear_to(&mut self, len: usize) -> Result<&mut Self> {
        if len > self.capacity() {
            return Err(WireError::BufferOverflow {
                needed: len,
                remaining: self.capacity(),
            });
        }
        self.position = 0;
        self.mark = 0;
        self.limit = len;
        Ok(self)
    }

    /// Turn what was written into a readable view of exactly those bytes.
    pub fn flip(&mut self) -> &mut Self {
        self.limit = self.position;
        self.position = 0;
        self.mark = 0;
        self
    }

    /// Move the unread bytes `[position, limit)` to the front.
    pub fn compact(&mut self) -> &mut Self {
        let (start, end) = (self.position, self.limit);
        self.store.as_mut().copy_within(start..end, 0);
        self.limit = end - start;
        self.position = 0;
        self.mark = 0;
        self
    }

    /// Advance `position` to the next multiple of `n`.
    ///
    /// When the padding would pass `limit`, `position` stays where it is and
    /// the following put/get reports the bound violation. Returns the number
    /// of bytes skipped.
    pub fn align(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        let rem = self.position % n;
        if rem == 0 {
            return 0;
        }
        let pad = n - rem;
        if pad > self.remaining() {
            return 0;
        }
        self.position += pad;
        pad
    }

    /// [`align`](Self::align), writing `fill` into the skipped bytes.
    pub fn align_fill(&mut self, n: usize, fill: u8) -> usize {
        let start = self.position;
        let pad = self.align(n);
        self.store.as_mut()[start..start + pad].fill(fill);
        pad
    }

    // ----- views -----

    /// The unread (or unwritten) bytes `[position, limit)`.
    pub fn remaining_slice(&self) -> &[u8] {
        &self.store.as_ref()[self.position..self.limit]
    }

    /// Mutable view of `[position, limit)`, e.g. for reading from a stream.
    pub fn remaining_mut(&mut self) -> &mut [u8] {
        let (start, end) = (self.position, self.limit);
        &mut self.store.as_mut()[start..end]
    }

    /// Bytes written so far, `[0, position)`.
    pub fn filled(&self) -> &[u8] {
        &self.store.as_ref()[..self.position]
    }

    /// The valid region `[0, limit)`.
    pub fn as_slice(&self) -> &[u8] {
        &self.store.as_ref()[..self.limit]
    }
}

impl<S: AsRef<[u8]>> fmt::Debug for SeqBuffer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeqBuffer")
            .field("position", &self.position)
            .field("limit", &self.limit)
            .field("mark", &self.mark)
            .field("capacity", &self.store.as_ref().len())
            .finish()
    }
}
