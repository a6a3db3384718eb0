//! Zero-copy loader over an in-memory image.
//!
//! The mapper walks the same schema as [`super::Reader`] but hands out
//! borrowed [`PodVec`]s pointing straight into the image. The caller owns
//! the backing bytes (a `memmap2::Mmap` or a static slice) and must keep
//! them alive for as long as the produced vectors exist; the trie types
//! uphold this through field drop order.

use super::storage::{pad8, Pod, PodVec};
use super::MAGIC;
use crate::error::{Error, Result};

/// Cursor over a complete serialized image held in memory.
pub struct Mapper<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Mapper<'a> {
    /// Wrap an image.
    ///
    /// The base pointer must be 8-byte aligned (memory maps always are)
    /// and the target little-endian, because mapped vectors reinterpret
    /// the raw bytes in place.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        if cfg!(target_endian = "big") {
            return Err(Error::invalid_format(
                "mapped access requires a little-endian target; use a copying load",
            ));
        }
        if data.as_ptr() as usize % 8 != 0 {
            return Err(Error::invalid_format("image base is not 8-byte aligned"));
        }
        Ok(Mapper { data, pos: 0 })
    }

    /// Bytes consumed so far.
    pub fn bytes_mapped(&self) -> usize {
        self.pos
    }

    /// Verify the 16-byte magic header.
    pub fn map_magic(&mut self) -> Result<()> {
        let bytes = self.take(16)?;
        if bytes != MAGIC {
            return Err(Error::invalid_format("bad magic header"));
        }
        Ok(())
    }

    /// Read one bare little-endian `u64` (copied; scalars are cheap).
    pub fn map_u64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
    }

    /// Read one bare little-endian `u32`.
    pub fn map_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    /// Borrow a framed vector from the image without copying.
    pub(crate) fn map_pod_vec<T: Pod>(&mut self) -> Result<PodVec<T>> {
        let count = self.map_u64()?;
        let count: usize = count
            .try_into()
            .map_err(|_| Error::invalid_format("vector count overflows usize"))?;
        let payload = count
            .checked_mul(T::SIZE)
            .ok_or_else(|| Error::invalid_format("vector payload overflows usize"))?;
        let bytes = self.take(pad8(payload))?;
        let ptr = bytes.as_ptr();
        if ptr as usize % std::mem::align_of::<T>() != 0 {
            return Err(Error::invalid_format("misaligned vector payload"));
        }
        Ok(PodVec::Borrowed {
            ptr: ptr.cast::<T>(),
            len: count,
        })
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| Error::invalid_format("truncated image"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::super::writer::Writer;
    use super::*;

    /// Vec<u8> allocations are not guaranteed 8-aligned; park the image
    /// inside a Vec<u64> and view it as bytes for mapping tests.
    struct AlignedImage {
        words: Vec<u64>,
        len: usize,
    }

    impl AlignedImage {
        fn from(bytes: &[u8]) -> Self {
            let mut words = vec![0u64; bytes.len().div_ceil(8)];
            unsafe {
                std::ptr::copy_nonoverlapping(
                    bytes.as_ptr(),
                    words.as_mut_ptr().cast::<u8>(),
                    bytes.len(),
                );
            }
            AlignedImage {
                words,
                len: bytes.len(),
            }
        }

        fn bytes(&self) -> &[u8] {
            unsafe { std::slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.len) }
        }
    }

    #[test]
    fn test_map_magic_and_vec() {
        let mut w = Writer::new(Vec::new());
        w.write_magic().unwrap();
        let v: PodVec<u64> = vec![3u64, 1, 4, 1, 5].into();
        w.write_pod_vec(&v).unwrap();
        let image = AlignedImage::from(&w.into_inner());

        let mut m = Mapper::new(image.bytes()).unwrap();
        m.map_magic().unwrap();
        let mapped: PodVec<u64> = m.map_pod_vec().unwrap();
        assert_eq!(&mapped[..], &[3, 1, 4, 1, 5]);
        assert_eq!(mapped.heap_size(), 0);
    }

    #[test]
    fn test_map_truncated() {
        let mut w = Writer::new(Vec::new());
        let v: PodVec<u32> = vec![1u32; 10].into();
        w.write_pod_vec(&v).unwrap();
        let image = AlignedImage::from(&w.into_inner());
        let bytes = image.bytes();

        let mut m = Mapper::new(&bytes[..bytes.len() - 8]).unwrap();
        let res: Result<PodVec<u32>> = m.map_pod_vec();
        assert!(matches!(res, Err(Error::InvalidFormat(_))));
    }
}
