//! Framed binary I/O.
//!
//! Three backends share one byte-exact, little-endian image:
//!
//! - [`Writer`] streams the image out in schema order;
//! - [`Reader`] streams it back in, copying into owned buffers;
//! - [`Mapper`] walks an in-memory copy (a `memmap2` map or a static
//!   slice) and borrows every vector in place.
//!
//! The image starts with a 16-byte magic header; everything after it is a
//! sequence of 8-byte-aligned records, either bare scalars or framed
//! vectors (`u64` element count, payload, zero padding to the boundary).

mod mapper;
mod reader;
pub(crate) mod storage;
mod writer;

pub use mapper::Mapper;
pub use reader::Reader;
pub use writer::Writer;

/// Magic header opening every serialized dictionary.
pub const MAGIC: &[u8; 16] = b"We love Marisa.\n";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_literal() {
        assert_eq!(MAGIC.len(), 16);
        assert_eq!(MAGIC[15], b'\n');
    }
}
