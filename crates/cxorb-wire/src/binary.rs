//! Native-layout binary encoder and decoder.
//!
//! Values are written little-endian, and every multi-byte value starts at an
//! offset (from the start of the buffer) that is a multiple of its width,
//! mirroring C struct layout. A peer that maps the bytes straight onto a
//! struct sees the same image we produce. Encoder padding is zero-filled;
//! the decoder skips it without looking.
//!
//! ```
//! use cxorb_wire::{Decoder, Encoder, SeqBuffer};
//!
//! let mut buf = SeqBuffer::with_capacity(16);
//! let mut enc = Encoder::new(&mut buf);
//! enc.put_bool(true).unwrap();
//! enc.put_u32(0xDEAD_BEEF).unwrap();
//! assert_eq!(buf.position(), 8);
//!
//! buf.flip();
//! let mut dec = Decoder::new(&mut buf);
//! assert!(dec.get_bool().unwrap());
//! assert_eq!(dec.get_u32().unwrap(), 0xDEAD_BEEF);
//! ```

use crate::buffer::SeqBuffer;
use crate::error::{Result, WireError};

/// Widest primitive we encode.
const MAX_WIDTH: usize = 8;

/// A fixed-width value with a little-endian wire image.
pub trait Primitive: Copy {
    /// Size in bytes; also the alignment applied before the value.
    const WIDTH: usize;

    /// Write the value into `dst`, which is exactly `WIDTH` bytes.
    fn write_le(self, dst: &mut [u8]);

    /// Read a value from `src`, which is exactly `WIDTH` bytes.
    fn read_le(src: &[u8]) -> Self;
}

macro_rules! impl_primitive {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Primitive for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                fn write_le(self, dst: &mut [u8]) {
                    dst.copy_from_slice(&self.to_le_bytes());
                }

                fn read_le(src: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(src);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_primitive!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl Primitive for bool {
    const WIDTH: usize = 1;

    fn write_le(self, dst: &mut [u8]) {
        dst[0] = u8::from(self);
    }

    fn read_le(src: &[u8]) -> Self {
        src[0] != 0
    }
}

/// Writes primitives into a [`SeqBuffer`].
///
/// A failed put leaves the buffer position where it was before the call.
pub struct Encoder<'a, S = Box<[u8]>> {
    buf: &'a mut SeqBuffer<S>,
}

impl<'a, S: AsRef<[u8]> + AsMut<[u8]>> Encoder<'a, S> {
    pub fn new(buf: &'a mut SeqBuffer<S>) -> Self {
        Self { buf }
    }

    /// The underlying buffer.
    pub fn buffer(&self) -> &SeqBuffer<S> {
        self.buf
    }

    /// Mutable access to the underlying buffer.
    pub fn buffer_mut(&mut self) -> &mut SeqBuffer<S> {
        self.buf
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.position()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.position() == 0
    }

    /// Align to the value's width, then write it.
    pub fn put<T: Primitive>(&mut self, value: T) -> Result<()> {
        let start = self.buf.position();
        self.buf.align_fill(T::WIDTH, 0);

        let mut raw = [0u8; MAX_WIDTH];
        value.write_le(&mut raw[..T::WIDTH]);
        self.buf
            .put_slice(&raw[..T::WIDTH])
            .inspect_err(|_| self.rollback(start))
    }

    pub fn put_bool(&mut self, value: bool) -> Result<()> {
        self.put(value)
    }

    pub fn put_u8(&mut self, value: u8) -> Result<()> {
        self.put(value)
    }

    pub fn put_i8(&mut self, value: i8) -> Result<()> {
        self.put(value)
    }

    pub fn put_u16(&mut self, value: u16) -> Result<()> {
        self.put(value)
    }

    pub fn put_i16(&mut self, value: i16) -> Result<()> {
        self.put(value)
    }

    pub fn put_u32(&mut self, value: u32) -> Result<()> {
        self.put(value)
    }

    pub fn put_i32(&mut self, value: i32) -> Result<()> {
        self.put(value)
    }

    pub fn put_u64(&mut self, value: u64) -> Result<()> {
        self.put(value)
    }

    pub fn put_i64(&mut self, value: i64) -> Result<()> {
        self.put(value)
    }

    pub fn put_f32(&mut self, value: f32) -> Result<()> {
        self.put(value)
    }

    pub fn put_f64(&mut self, value: f64) -> Result<()> {
        self.put(value)
    }

    /// Write a raw run of bytes, unaligned.
    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.put_slice(bytes)
    }

    /// Write a `u16` element count followed by the bytes.
    pub fn put_byte_array(&mut self, bytes: &[u8]) -> Result<()> {
        let count = u16::try_from(bytes.len()).map_err(|_| WireError::MessageTooLarge {
            size: bytes.len(),
            max: u16::MAX as usize,
        })?;
        let start = self.buf.position();
        self.put(count)?;
        self.buf
            .put_slice(bytes)
            .inspect_err(|_| self.rollback(start))
    }

    fn rollback(&mut self, position: usize) {
        self.buf.restore_position(position);
    }
}

/// Reads primitives from a [`SeqBuffer`], mirroring [`Encoder`].
///
/// A failed get leaves the buffer position where it was before the call.
pub struct Decoder<'a, S = Box<[u8]>> {
    buf: &'a mut SeqBuffer<S>,
}

impl<'a, S: AsRef<[u8]> + AsMut<[u8]>> Decoder<'a, S> {
    pub fn new(buf: &'a mut SeqBuffer<S>) -> Self {
        Self { buf }
    }

    pub fn buffer(&self) -> &SeqBuffer<S> {
        self.buf
    }

    pub fn buffer_mut(&mut self) -> &mut SeqBuffer<S> {
        self.buf
    }

    /// Bytes left to decode.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn has_remaining(&self) -> bool {
        self.buf.has_remaining()
    }

    /// Skip alignment padding, then read a value.
    pub fn get<T: Primitive>(&mut self) -> Result<T> {
        let start = self.buf.position();
        self.buf.align(T::WIDTH);

        let mut raw = [0u8; MAX_WIDTH];
        match self.buf.get_slice(&mut raw[..T::WIDTH]) {
            Ok(()) => Ok(T::read_le(&raw[..T::WIDTH])),
            Err(err) => {
                self.rollback(start);
                Err(err)
            }
        }
    }

    /// Read a value if one is present, `None` when the buffer is exhausted.
    ///
    /// For trailing optional parameters. Bytes that are present but too few
    /// for a `T` are still an underflow.
    pub fn get_opt<T: Primitive>(&mut self) -> Result<Option<T>> {
        if !self.has_remaining() {
            return Ok(None);
        }
        self.get().map(Some)
    }

    pub fn get_bool(&mut self) -> Result<bool> {
        self.get()
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        self.get()
    }

    pub fn get_i8(&mut self) -> Result<i8> {
        self.get()
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        self.get()
    }

    pub fn get_i16(&mut self) -> Result<i16> {
        self.get()
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        self.get()
    }

    pub fn get_i32(&mut self) -> Result<i32> {
        self.get()
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        self.get()
    }

    pub fn get_i64(&mut self) -> Result<i64> {
        self.get()
    }

    pub fn get_f32(&mut self) -> Result<f32> {
        self.get()
    }

    pub fn get_f64(&mut self) -> Result<f64> {
        self.get()
    }

    /// Fill `dst` from a raw, unaligned run of bytes.
    pub fn get_bytes(&mut self, dst: &mut [u8]) -> Result<()> {
        self.buf.get_slice(dst)
    }

    /// Read a `u16` element count followed by that many bytes.
    pub fn get_byte_array(&mut self) -> Result<Vec<u8>> {
        let start = self.buf.position();
        let count = usize::from(self.get::<u16>()?);
        let mut out = vec![0u8; count];
        self.buf
            .get_slice(&mut out)
            .inspect_err(|_| self.rollback(start))?;
        Ok(out)
    }

    fn rollback(&mut self, position: usize) {
        self.buf.restore_position(position);
    }
}
