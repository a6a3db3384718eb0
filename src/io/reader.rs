//! Streaming, copying reader for the framed dictionary image.

use std::io::Read;

use super::storage::{pad8, Pod, PodVec};
use super::MAGIC;
use crate::error::{Error, Result};

/// Upper bound on one read chunk while draining a framed payload.
///
/// A corrupt count word must not translate into a giant up-front
/// allocation; memory grows only as bytes actually arrive.
const CHUNK: usize = 64 * 1024;

/// Deserializer consuming the byte-exact on-disk image from any
/// [`Read`] source.
pub struct Reader<R: Read> {
    inner: R,
}

impl<R: Read> Reader<R> {
    /// Wrap a source.
    pub fn new(inner: R) -> Self {
        Reader { inner }
    }

    /// Finish reading and return the source.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read and verify the 16-byte magic header.
    pub fn read_magic(&mut self) -> Result<()> {
        let mut buf = [0u8; 16];
        self.read_raw(&mut buf)?;
        if buf != *MAGIC {
            return Err(Error::invalid_format("bad magic header"));
        }
        Ok(())
    }

    /// Read one bare little-endian `u64`.
    pub fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_raw(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Read one bare little-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_raw(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Read a framed vector into owned storage.
    pub(crate) fn read_pod_vec<T: Pod>(&mut self) -> Result<PodVec<T>> {
        let count = self.read_u64()?;
        let count: usize = count
            .try_into()
            .map_err(|_| Error::invalid_format("vector count overflows usize"))?;
        let payload = count
            .checked_mul(T::SIZE)
            .ok_or_else(|| Error::invalid_format("vector payload overflows usize"))?;

        let mut bytes = Vec::new();
        let mut remaining = pad8(payload);
        let mut chunk = vec![0u8; CHUNK.min(remaining)];
        while remaining > 0 {
            let take = CHUNK.min(remaining);
            self.read_raw(&mut chunk[..take])?;
            bytes.extend_from_slice(&chunk[..take]);
            remaining -= take;
        }

        let mut items = Vec::with_capacity(count.min(bytes.len() / T::SIZE.max(1)));
        for i in 0..count {
            items.push(T::read_le(&bytes[i * T::SIZE..(i + 1) * T::SIZE]));
        }
        Ok(PodVec::Owned(items))
    }

    fn read_raw(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner
            .read_exact(buf)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => Error::invalid_format("truncated image"),
                _ => Error::Io(e),
            })
    }
}
