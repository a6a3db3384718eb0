//! Bit-level storage: broadword primitives, a rank/select bit vector,
//! and a width-minimal packed integer array.

pub(crate) mod bit_vec;
pub(crate) mod broadword;
pub(crate) mod packed;

pub use bit_vec::BitVec;
pub use broadword::{popcount_word, select_in_word};
pub use packed::PackedVec;
