//! Bit vector with O(1) rank and O(log n) select.
//!
//! # Structure
//!
//! - **Rank index**: one 8-byte [`RankBlock`] per 256-bit block holding the
//!   absolute popcount before the block (`u32`) and the relative popcount
//!   before each of its four words (`u8` each), plus a trailing sentinel
//!   block whose absolute count is the total. Rank is two lookups and one
//!   word popcount.
//! - **Select index**: one `u32` rank-block index per 512 set (or unset)
//!   bits, with a trailing sentinel. Select binary-searches rank blocks
//!   inside the sampled window, scans the four words through the relative
//!   counts, and finishes with a byte-table select inside one word.
//!
//! Either select index is optional; rank is always available after
//! [`BitVec::build`].

use super::broadword::{popcount_word, select_in_word};
use crate::error::{Error, Result};
use crate::io::storage::{Pod, PodVec};
use crate::io::{Mapper, Reader, Writer};

/// Bits covered by one rank block.
const BLOCK_BITS: usize = 256;

/// Set/unset bits between two select samples.
const SELECT_SPAN: usize = 512;

/// Rank information for one 256-bit block.
#[derive(Clone, Copy, Debug, Default)]
#[repr(C)]
pub(crate) struct RankBlock {
    /// 1-bits before this block.
    abs: u32,
    /// 1-bits inside this block before word 0..4.
    rels: [u8; 4],
}

unsafe impl Pod for RankBlock {
    const SIZE: usize = 8;

    #[inline]
    fn write_le(&self, out: &mut [u8]) {
        out[..4].copy_from_slice(&self.abs.to_le_bytes());
        out[4..8].copy_from_slice(&self.rels);
    }

    #[inline]
    fn read_le(bytes: &[u8]) -> Self {
        RankBlock {
            abs: u32::from_le_bytes(bytes[..4].try_into().unwrap()),
            rels: bytes[4..8].try_into().unwrap(),
        }
    }
}

/// Succinct bit vector.
///
/// Push bits, call [`build`](Self::build) once, then query. A vector
/// loaded from an image is already frozen.
#[derive(Default, Debug)]
pub struct BitVec {
    units: PodVec<u64>,
    len: usize,
    num_ones: usize,
    ranks: PodVec<RankBlock>,
    select0s: PodVec<u32>,
    select1s: PodVec<u32>,
}

impl BitVec {
    /// Create an empty vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one bit.
    pub fn push(&mut self, bit: bool) {
        let word = self.len / 64;
        if word == self.units.len() {
            self.units.push(0);
        }
        if bit {
            match &mut self.units {
                PodVec::Owned(v) => v[word] |= 1u64 << (self.len % 64),
                PodVec::Borrowed { .. } => unreachable!("push into mapped vector"),
            }
            self.num_ones += 1;
        }
        self.len += 1;
    }

    /// Bit at position `i`.
    #[inline]
    pub fn get(&self, i: usize) -> bool {
        debug_assert!(i < self.len);
        (self.units[i / 64] >> (i % 64)) & 1 == 1
    }

    /// Number of bits.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no bits are stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of 1-bits.
    #[inline]
    pub fn count_ones(&self) -> usize {
        self.num_ones
    }

    /// Number of 0-bits.
    #[inline]
    pub fn count_zeros(&self) -> usize {
        self.len - self.num_ones
    }

    /// Freeze the vector and build the rank index, plus the select
    /// indices asked for.
    pub fn build(&mut self, enable_select0: bool, enable_select1: bool) {
        let num_blocks = self.len.div_ceil(BLOCK_BITS);
        let mut ranks = Vec::with_capacity(num_blocks + 1);
        let mut abs = 0u32;
        for block in 0..num_blocks {
            let mut rels = [0u8; 4];
            let mut rel = 0u32;
            for (j, slot) in rels.iter_mut().enumerate() {
                *slot = rel as u8;
                let w = block * 4 + j;
                if w < self.units.len() {
                    rel += popcount_word(self.units[w]);
                }
            }
            ranks.push(RankBlock { abs, rels });
            abs += rel;
        }
        ranks.push(RankBlock {
            abs: self.num_ones as u32,
            rels: [0u8; 4],
        });

        self.select1s = if enable_select1 {
            Self::sample_select(num_blocks, |b| ranks[b].abs as usize).into()
        } else {
            PodVec::new()
        };
        self.select0s = if enable_select0 {
            let total_zeros = self.len - self.num_ones;
            Self::sample_select(num_blocks, |b| {
                if b == num_blocks {
                    total_zeros
                } else {
                    b * BLOCK_BITS - ranks[b].abs as usize
                }
            })
            .into()
        } else {
            PodVec::new()
        };
        self.ranks = ranks.into();
    }

    /// Block index per SELECT_SPAN matched bits, with a trailing sentinel.
    fn sample_select(num_blocks: usize, count_before: impl Fn(usize) -> usize) -> Vec<u32> {
        let mut samples = Vec::new();
        let mut k = 0usize;
        for b in 0..num_blocks {
            while k * SELECT_SPAN < count_before(b + 1) {
                samples.push(b as u32);
                k += 1;
            }
        }
        samples.push(num_blocks as u32);
        samples
    }

    /// 1-bits in positions `[0, i)`.
    #[inline]
    pub fn rank1(&self, i: usize) -> usize {
        debug_assert!(i <= self.len);
        if i >= self.len {
            return self.num_ones;
        }
        let block = &self.ranks[i / BLOCK_BITS];
        let j = (i % BLOCK_BITS) / 64;
        let mut r = block.abs as usize + block.rels[j] as usize;
        let w = i % 64;
        if w > 0 {
            r += popcount_word(self.units[i / 64] & ((1u64 << w) - 1)) as usize;
        }
        r
    }

    /// 0-bits in positions `[0, i)`.
    #[inline]
    pub fn rank0(&self, i: usize) -> usize {
        i - self.rank1(i)
    }

    /// Position of the k-th 1-bit (0-indexed), or `None` past the end.
    pub fn select1(&self, k: usize) -> Option<usize> {
        if k >= self.num_ones {
            return None;
        }
        let num_blocks = self.ranks.len() - 1;
        let window = k / SELECT_SPAN;
        if self.select1s.len() < window + 2 {
            return None;
        }
        let lo = self.select1s[window] as usize;
        let hi = (self.select1s[window + 1] as usize).min(num_blocks - 1);
        let b = Self::partition(lo, hi, |b| self.ranks[b].abs as usize <= k);
        let block = &self.ranks[b];
        let mut r = k - block.abs as usize;
        let mut j = 3;
        while j > 0 && block.rels[j] as usize > r {
            j -= 1;
        }
        r -= block.rels[j] as usize;
        let w = b * 4 + j;
        Some(b * BLOCK_BITS + j * 64 + select_in_word(self.units[w], r as u32) as usize)
    }

    /// Position of the k-th 0-bit (0-indexed), or `None` past the end.
    pub fn select0(&self, k: usize) -> Option<usize> {
        if k >= self.count_zeros() {
            return None;
        }
        let num_blocks = self.ranks.len() - 1;
        let zeros_before = |b: usize| b * BLOCK_BITS - self.ranks[b].abs as usize;
        let window = k / SELECT_SPAN;
        if self.select0s.len() < window + 2 {
            return None;
        }
        let lo = self.select0s[window] as usize;
        let hi = (self.select0s[window + 1] as usize).min(num_blocks - 1);
        let b = Self::partition(lo, hi, |b| zeros_before(b) <= k);
        let mut r = k - zeros_before(b);
        let rels = self.ranks[b].rels;
        let mut j = 3;
        while j > 0 && j * 64 - rels[j] as usize > r {
            j -= 1;
        }
        r -= j * 64 - rels[j] as usize;
        let w = b * 4 + j;
        Some(b * BLOCK_BITS + j * 64 + select_in_word(!self.units[w], r as u32) as usize)
    }

    /// Largest index in `[lo, hi]` satisfying `pred` (monotone).
    #[inline]
    fn partition(mut lo: usize, mut hi: usize, pred: impl Fn(usize) -> bool) -> usize {
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            if pred(mid) {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        lo
    }

    /// Serialized size in bytes.
    pub fn io_size(&self) -> usize {
        self.units.io_size()
            + 16
            + self.ranks.io_size()
            + self.select0s.io_size()
            + self.select1s.io_size()
    }

    /// Heap bytes held.
    pub fn heap_size(&self) -> usize {
        self.units.heap_size()
            + self.ranks.heap_size()
            + self.select0s.heap_size()
            + self.select1s.heap_size()
    }

    /// Write the image: units, size, popcount, rank blocks, select samples.
    pub fn write<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.write_pod_vec(&self.units)?;
        writer.write_u64(self.len as u64)?;
        writer.write_u64(self.num_ones as u64)?;
        writer.write_pod_vec(&self.ranks)?;
        writer.write_pod_vec(&self.select0s)?;
        writer.write_pod_vec(&self.select1s)?;
        Ok(())
    }

    /// Read a frozen vector from a streamed image.
    pub fn read<R: std::io::Read>(reader: &mut Reader<R>) -> Result<Self> {
        let units = reader.read_pod_vec()?;
        let len = reader.read_u64()? as usize;
        let num_ones = reader.read_u64()? as usize;
        let ranks = reader.read_pod_vec()?;
        let select0s = reader.read_pod_vec()?;
        let select1s = reader.read_pod_vec()?;
        let vec = BitVec {
            units,
            len,
            num_ones,
            ranks,
            select0s,
            select1s,
        };
        vec.validate()?;
        Ok(vec)
    }

    /// Borrow a frozen vector from a mapped image.
    pub fn map(mapper: &mut Mapper<'_>) -> Result<Self> {
        let units = mapper.map_pod_vec()?;
        let len = mapper.map_u64()? as usize;
        let num_ones = mapper.map_u64()? as usize;
        let ranks = mapper.map_pod_vec()?;
        let select0s = mapper.map_pod_vec()?;
        let select1s = mapper.map_pod_vec()?;
        let vec = BitVec {
            units,
            len,
            num_ones,
            ranks,
            select0s,
            select1s,
        };
        vec.validate()?;
        Ok(vec)
    }

    /// Structural consistency checks shared by both load paths.
    fn validate(&self) -> Result<()> {
        if self.num_ones > self.len {
            return Err(Error::invalid_format("bit vector: popcount exceeds size"));
        }
        if self.units.len() != self.len.div_ceil(64) {
            return Err(Error::invalid_format("bit vector: unit count mismatch"));
        }
        let expected_blocks = self.len.div_ceil(BLOCK_BITS) + 1;
        if !self.ranks.is_empty() && self.ranks.len() != expected_blocks {
            return Err(Error::invalid_format("bit vector: rank block count mismatch"));
        }
        if self.ranks.is_empty() && self.len != 0 {
            return Err(Error::invalid_format("bit vector: missing rank index"));
        }
        let num_blocks = self.ranks.len().saturating_sub(1);
        for sel in [&self.select0s, &self.select1s] {
            if let Some(&last) = sel.last() {
                if last as usize != num_blocks {
                    return Err(Error::invalid_format("bit vector: select sentinel mismatch"));
                }
            }
        }
        Ok(())
    }
}
