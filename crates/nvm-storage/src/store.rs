//! Store trait and fixed-width value codec

use crate::StorageError;

/// A fixed-width value that can be laid out in non-volatile memory.
///
/// Encodings are little-endian and exactly `SIZE` bytes long, so a region's
/// layout depends only on the sequence of types written to it.
pub trait NvmValue: Sized {
    /// Encoded width in bytes
    const SIZE: usize;

    /// Encode into `out`, which is exactly `SIZE` bytes
    fn encode(&self, out: &mut [u8]);

    /// Decode from `bytes`, which is exactly `SIZE` bytes
    fn decode(bytes: &[u8]) -> Self;
}

impl NvmValue for i32 {
    const SIZE: usize = 4;

    fn encode(&self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(bytes);
        i32::from_le_bytes(raw)
    }
}

impl NvmValue for u32 {
    const SIZE: usize = 4;

    fn encode(&self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(bytes);
        u32::from_le_bytes(raw)
    }
}

impl NvmValue for bool {
    const SIZE: usize = 1;

    fn encode(&self, out: &mut [u8]) {
        out[0] = u8::from(*self);
    }

    fn decode(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

/// Byte-addressable non-volatile store
pub trait NvmStore {
    /// Total addressable size in bytes
    fn len(&self) -> usize;

    /// Whether the store has no addressable bytes
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `buf` from the bytes starting at `offset`
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Write `data` starting at `offset`
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError>;

    /// Read a fixed-width value at `offset`
    fn get<T: NvmValue>(&self, offset: usize) -> Result<T, StorageError>
    where
        Self: Sized,
    {
        let mut buf = vec![0u8; T::SIZE];
        self.read(offset, &mut buf)?;
        Ok(T::decode(&buf))
    }

    /// Write a fixed-width value at `offset`, returning the offset after it
    fn put<T: NvmValue>(&mut self, offset: usize, value: &T) -> Result<usize, StorageError>
    where
        Self: Sized,
    {
        let mut buf = vec![0u8; T::SIZE];
        value.encode(&mut buf);
        self.write(offset, &buf)?;
        Ok(offset + T::SIZE)
    }
}

/// Bounds check shared by the store implementations
pub(crate) fn check_bounds(offset: usize, len: usize, size: usize) -> Result<(), StorageError> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(StorageError::OutOfBounds { offset, len, size }),
    }
}
