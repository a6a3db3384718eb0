//! Streaming writer for the framed dictionary image.

use std::io::Write;

use super::storage::{pad8, Pod, PodVec};
use super::MAGIC;
use crate::error::Result;

/// Serializer producing the byte-exact on-disk image.
///
/// Records are emitted in schema order and every record keeps the stream on
/// an 8-byte boundary, so readers and mappers never see misaligned fields.
pub struct Writer<W: Write> {
    inner: W,
    written: usize,
}

impl<W: Write> Writer<W> {
    /// Wrap a sink.
    pub fn new(inner: W) -> Self {
        Writer { inner, written: 0 }
    }

    /// Total bytes written so far.
    pub fn bytes_written(&self) -> usize {
        self.written
    }

    /// Finish writing and return the sink.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Write the 16-byte magic header.
    pub fn write_magic(&mut self) -> Result<()> {
        self.write_raw(MAGIC)
    }

    /// Write one bare little-endian `u64`.
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Write one bare little-endian `u32`.
    ///
    /// Callers emit these in adjacent pairs so the stream stays 8-aligned.
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Write a framed vector: `u64` count, payload, zero padding to 8 bytes.
    pub(crate) fn write_pod_vec<T: Pod>(&mut self, vec: &PodVec<T>) -> Result<()> {
        self.write_u64(vec.len() as u64)?;
        let mut buf = [0u8; 64];
        debug_assert!(T::SIZE <= buf.len());
        for item in vec.iter() {
            item.write_le(&mut buf[..T::SIZE]);
            self.write_raw(&buf[..T::SIZE])?;
        }
        let payload = vec.len() * T::SIZE;
        let pad = pad8(payload) - payload;
        if pad > 0 {
            self.write_raw(&[0u8; 8][..pad])?;
        }
        Ok(())
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.written += bytes.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_is_16_bytes() {
        let mut w = Writer::new(Vec::new());
        w.write_magic().unwrap();
        let out = w.into_inner();
        assert_eq!(out.len(), 16);
        assert_eq!(&out, b"We love Marisa.\n");
    }

    #[test]
    fn test_vec_framing_and_padding() {
        let mut w = Writer::new(Vec::new());
        let v: PodVec<u32> = vec![1u32, 2, 3].into();
        w.write_pod_vec(&v).unwrap();
        let out = w.into_inner();
        // count (8) + payload (12) + pad (4)
        assert_eq!(out.len(), 24);
        assert_eq!(u64::from_le_bytes(out[0..8].try_into().unwrap()), 3);
        assert_eq!(u32::from_le_bytes(out[8..12].try_into().unwrap()), 1);
        assert_eq!(&out[20..24], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_bytes_written_tracks_alignment() {
        let mut w = Writer::new(Vec::new());
        w.write_magic().unwrap();
        let v: PodVec<u8> = vec![9u8; 5].into();
        w.write_pod_vec(&v).unwrap();
        assert_eq!(w.bytes_written() % 8, 0);
        w.write_u32(1).unwrap();
        w.write_u32(2).unwrap();
        assert_eq!(w.bytes_written() % 8, 0);
    }
}
