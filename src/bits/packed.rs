//! Integer array bit-packed to the width of its largest value.

use crate::error::{Error, Result};
use crate::io::storage::PodVec;
use crate::io::{Mapper, Reader, Writer};

/// Array of unsigned integers stored at `width` bits per element,
/// `width = bit_width(max_value)`, chosen once at build time.
///
/// Values may straddle `u64` unit boundaries. Width 0 (an empty array or
/// all zeros) stores no units at all.
#[derive(Default, Debug)]
pub struct PackedVec {
    units: PodVec<u64>,
    width: u32,
    mask: u64,
    len: usize,
}

impl PackedVec {
    /// Maximum element width the format accepts.
    pub const MAX_WIDTH: u32 = 32;

    /// Pack `values` at the minimum width covering their maximum.
    pub fn build(values: &[u32]) -> Self {
        let max = values.iter().copied().max().unwrap_or(0);
        let width = 32 - max.leading_zeros();
        let mask = if width == 0 { 0 } else { (1u64 << width) - 1 };
        let num_units = (values.len() * width as usize).div_ceil(64);
        let mut units = vec![0u64; num_units];
        for (i, &value) in values.iter().enumerate() {
            let bit = i * width as usize;
            let unit = bit / 64;
            let shift = bit % 64;
            units[unit] |= (value as u64) << shift;
            if shift + width as usize > 64 {
                units[unit + 1] |= (value as u64) >> (64 - shift);
            }
        }
        PackedVec {
            units: units.into(),
            width,
            mask,
            len: values.len(),
        }
    }

    /// Element at `i`.
    #[inline]
    pub fn get(&self, i: usize) -> u32 {
        debug_assert!(i < self.len);
        if self.width == 0 {
            return 0;
        }
        let bit = i * self.width as usize;
        let unit = bit / 64;
        let shift = bit % 64;
        let mut value = self.units[unit] >> shift;
        if shift + self.width as usize > 64 {
            value |= self.units[unit + 1] << (64 - shift);
        }
        (value & self.mask) as u32
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no elements are stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bits per element.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Serialized size in bytes.
    pub fn io_size(&self) -> usize {
        self.units.io_size() + 24
    }

    /// Heap bytes held.
    pub fn heap_size(&self) -> usize {
        self.units.heap_size()
    }

    /// Write the image: units, value size, mask, element count.
    pub fn write<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.write_pod_vec(&self.units)?;
        writer.write_u64(self.width as u64)?;
        writer.write_u64(self.mask)?;
        writer.write_u64(self.len as u64)?;
        Ok(())
    }

    /// Read a packed vector from a streamed image.
    pub fn read<R: std::io::Read>(reader: &mut Reader<R>) -> Result<Self> {
        let units = reader.read_pod_vec()?;
        let width = reader.read_u64()?;
        let mask = reader.read_u64()?;
        let len = reader.read_u64()? as usize;
        Self::assemble(units, width, mask, len)
    }

    /// Borrow a packed vector from a mapped image.
    pub fn map(mapper: &mut Mapper<'_>) -> Result<Self> {
        let units = mapper.map_pod_vec()?;
        let width = mapper.map_u64()?;
        let mask = mapper.map_u64()?;
        let len = mapper.map_u64()? as usize;
        Self::assemble(units, width, mask, len)
    }

    fn assemble(units: PodVec<u64>, width: u64, mask: u64, len: usize) -> Result<Self> {
        if width > Self::MAX_WIDTH as u64 {
            return Err(Error::invalid_format("packed vector: value size exceeds 32"));
        }
        let width = width as u32;
        let expected_mask = if width == 0 { 0 } else { (1u64 << width) - 1 };
        if mask != expected_mask {
            return Err(Error::invalid_format("packed vector: mask mismatch"));
        }
        if units.len() != (len * width as usize).div_ceil(64) {
            return Err(Error::invalid_format("packed vector: unit count mismatch"));
        }
        Ok(PackedVec {
            units,
            width,
            mask,
            len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        let pv = PackedVec::build(&[]);
        assert!(pv.is_empty());
        assert_eq!(pv.width(), 0);
    }

    #[test]
    fn test_all_zeros_width_zero() {
        let pv = PackedVec::build(&[0, 0, 0, 0]);
        assert_eq!(pv.width(), 0);
        assert_eq!(pv.len(), 4);
        for i in 0..4 {
            assert_eq!(pv.get(i), 0);
        }
    }

    #[test]
    fn test_width_selection() {
        assert_eq!(PackedVec::build(&[1]).width(), 1);
        assert_eq!(PackedVec::build(&[255]).width(), 8);
        assert_eq!(PackedVec::build(&[256]).width(), 9);
        assert_eq!(PackedVec::build(&[u32::MAX]).width(), 32);
    }

    #[test]
    fn test_roundtrip_values() {
        let values: Vec<u32> = (0..500).map(|i| (i * 2654435761u64 % 100_000) as u32).collect();
        let pv = PackedVec::build(&values);
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(pv.get(i), v, "index {}", i);
        }
    }

    #[test]
    fn test_unit_straddling() {
        // Width 9 guarantees elements crossing unit boundaries.
        let values: Vec<u32> = (0..200).map(|i| (i * 3 % 512) as u32).collect();
        let pv = PackedVec::build(&values);
        assert_eq!(pv.width(), 9);
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(pv.get(i), v);
        }
    }

    #[test]
    fn test_io_roundtrip() {
        let values: Vec<u32> = (0..300).map(|i| i * 7 % 1000).collect();
        let pv = PackedVec::build(&values);
        let mut w = Writer::new(Vec::new());
        pv.write(&mut w).unwrap();
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), pv.io_size());

        let mut r = Reader::new(&bytes[..]);
        let back = PackedVec::read(&mut r).unwrap();
        assert_eq!(back.len(), pv.len());
        assert_eq!(back.width(), pv.width());
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(back.get(i), v);
        }
    }

    #[test]
    fn test_read_rejects_wide_values() {
        let pv = PackedVec::build(&[1, 2, 3]);
        let mut w = Writer::new(Vec::new());
        pv.write(&mut w).unwrap();
        let mut bytes = w.into_inner();
        // width scalar follows the unit blob (8 count + 8 payload).
        bytes[16..24].copy_from_slice(&33u64.to_le_bytes());
        let mut r = Reader::new(&bytes[..]);
        assert!(matches!(PackedVec::read(&mut r), Err(Error::InvalidFormat(_))));
    }
}
