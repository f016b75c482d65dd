//! Typed descriptors for header fields and counter buffers
//!
//! All reads and writes into the mapped file go through these so that every
//! access is bounds checked against the slice it touches.

use crate::error::{MonitorError, MonitorResult};
use byteorder::{ByteOrder, NativeEndian};
use common::{Encoded, SIZE_OF_INT, fixed_str};
use std::ops::Range;

fn bounded(buf_len: usize, range: Range<usize>) -> MonitorResult<Range<usize>> {
    if range.end > buf_len {
        return Err(MonitorError::MappingTooSmall {
            required: range.end,
            actual: buf_len,
        });
    }
    Ok(range)
}

/// A native-order `i32` field at a fixed offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntField(usize);

impl IntField {
    /// Field at `offset` bytes from the start of the file
    #[must_use]
    pub const fn at(offset: usize) -> Self {
        Self(offset)
    }

    /// Byte offset of the field
    #[must_use]
    pub const fn offset(self) -> usize {
        self.0
    }

    /// First byte past the field
    #[must_use]
    pub const fn end(self) -> usize {
        self.0 + SIZE_OF_INT
    }

    /// Read the field
    ///
    /// # Errors
    ///
    /// Returns `MappingTooSmall` if `buf` does not cover the field.
    pub fn read(self, buf: &[u8]) -> MonitorResult<i32> {
        let range = bounded(buf.len(), self.0..self.end())?;
        Ok(NativeEndian::read_i32(&buf[range]))
    }

    /// Write the field
    ///
    /// # Errors
    ///
    /// Returns `MappingTooSmall` if `buf` does not cover the field.
    pub fn write(self, buf: &mut [u8], value: i32) -> MonitorResult<()> {
        let range = bounded(buf.len(), self.0..self.end())?;
        NativeEndian::write_i32(&mut buf[range], value);
        Ok(())
    }

    /// Read the field as a non-negative length or offset
    ///
    /// # Errors
    ///
    /// Returns `CorruptHeader` if the stored value is negative.
    pub fn read_usize(self, buf: &[u8]) -> MonitorResult<usize> {
        let value = self.read(buf)?;
        usize::try_from(value).map_err(|_| MonitorError::CorruptHeader {
            offset: self.0,
            details: format!("negative value {value}"),
        })
    }

    /// Write a length or offset that must fit the 32-bit field
    ///
    /// # Errors
    ///
    /// Returns `LayoutOverflow` if `value` exceeds `i32::MAX`.
    pub fn write_usize(self, buf: &mut [u8], value: usize) -> MonitorResult<()> {
        let value = i32::try_from(value).map_err(|_| MonitorError::LayoutOverflow {
            details: format!("value {value} does not fit field at offset {}", self.0),
        })?;
        self.write(buf, value)
    }
}

/// A fixed-width UTF-8 string field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StrField {
    offset: usize,
    width: usize,
}

impl StrField {
    /// Field of `width` bytes at `offset`
    #[must_use]
    pub const fn new(offset: usize, width: usize) -> Self {
        Self { offset, width }
    }

    /// Byte offset of the field
    #[must_use]
    pub const fn offset(self) -> usize {
        self.offset
    }

    /// Width of the field in bytes, length prefix included
    #[must_use]
    pub const fn width(self) -> usize {
        self.width
    }

    /// First byte past the field
    #[must_use]
    pub const fn end(self) -> usize {
        self.offset + self.width
    }

    /// Largest payload the field stores without truncation
    #[must_use]
    pub const fn capacity(self) -> usize {
        fixed_str::capacity(self.width)
    }

    /// Encode `value` into the field
    ///
    /// # Errors
    ///
    /// Returns `MappingTooSmall` if `buf` does not cover the field.
    pub fn write(self, buf: &mut [u8], value: &str) -> MonitorResult<Encoded> {
        let range = bounded(buf.len(), self.offset..self.end())?;
        Ok(fixed_str::encode(&mut buf[range], value)?)
    }

    /// Decode the field
    ///
    /// # Errors
    ///
    /// Returns `MappingTooSmall` if `buf` does not cover the field and
    /// `Encoding` if the stored bytes are not a valid string field.
    pub fn read(self, buf: &[u8]) -> MonitorResult<&str> {
        let range = bounded(buf.len(), self.offset..self.end())?;
        Ok(fixed_str::decode(&buf[range])?)
    }
}

/// A resolved counter buffer: absolute offset and length within the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferRegion {
    offset: usize,
    length: usize,
}

impl BufferRegion {
    /// Region of `length` bytes at `offset`
    #[must_use]
    pub const fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    /// Start of the region
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Length of the region
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Whether the region is empty
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// First byte past the region
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Byte range covered by the region
    #[must_use]
    pub const fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }

    /// Whether `other` lies entirely inside this region
    #[must_use]
    pub const fn contains(&self, other: &Self) -> bool {
        other.offset >= self.offset && other.end() <= self.end()
    }

    /// Whether the two regions share at least one byte
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }

    /// Borrow the region's bytes
    ///
    /// # Errors
    ///
    /// Returns `MappingTooSmall` if `buf` ends before the region does.
    pub fn slice<'a>(&self, buf: &'a [u8]) -> MonitorResult<&'a [u8]> {
        let range = bounded(buf.len(), self.range())?;
        Ok(&buf[range])
    }

    /// Mutably borrow the region's bytes
    ///
    /// # Errors
    ///
    /// Returns `MappingTooSmall` if `buf` ends before the region does.
    pub fn slice_mut<'a>(&self, buf: &'a mut [u8]) -> MonitorResult<&'a mut [u8]> {
        let range = bounded(buf.len(), self.range())?;
        Ok(&mut buf[range])
    }
}
