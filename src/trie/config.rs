//! Build configuration and its packed flag-word encoding.

use crate::error::{Error, Result};

/// Bit layout of the serialized config word.
mod mask {
    pub const NUM_TRIES: u32 = 0x0000_007F;
    pub const CACHE_LEVEL: u32 = 0x0000_0F80;
    pub const TAIL_MODE: u32 = 0x0000_F000;
    pub const NODE_ORDER: u32 = 0x000F_0000;
}

/// Suffix storage mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TailMode {
    /// NUL-terminated suffixes; switches to binary automatically when a
    /// suffix contains a zero byte.
    #[default]
    Text,
    /// Suffix ends marked in a parallel bit vector; holds any bytes.
    Binary,
}

impl TailMode {
    fn code(self) -> u32 {
        match self {
            TailMode::Text => 0x1,
            TailMode::Binary => 0x2,
        }
    }

    fn from_code(code: u32) -> Result<Self> {
        match code {
            0x1 => Ok(TailMode::Text),
            0x2 => Ok(TailMode::Binary),
            _ => Err(Error::invalid_format("unknown tail mode")),
        }
    }
}

/// Sibling arrangement inside one parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NodeOrder {
    /// Ascending label byte; predictable enumeration order.
    Label,
    /// Descending accumulated weight; faster matching on skewed
    /// workloads (default).
    #[default]
    Weight,
}

impl NodeOrder {
    fn code(self) -> u32 {
        match self {
            NodeOrder::Label => 0x1,
            NodeOrder::Weight => 0x2,
        }
    }

    fn from_code(code: u32) -> Result<Self> {
        match code {
            0x1 => Ok(NodeOrder::Label),
            0x2 => Ok(NodeOrder::Weight),
            _ => Err(Error::invalid_format("unknown node order")),
        }
    }
}

/// Transition-cache sizing: the table holds roughly `num_keys / divisor`
/// slots, rounded up to a power of two.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CacheLevel {
    /// Largest table, fastest hot paths.
    Huge,
    /// Above default.
    Large,
    /// Default trade-off.
    #[default]
    Normal,
    /// Below default.
    Small,
    /// Smallest table.
    Tiny,
}

impl CacheLevel {
    /// Keys per cache slot.
    pub(crate) fn divisor(self) -> usize {
        match self {
            CacheLevel::Huge => 128,
            CacheLevel::Large => 256,
            CacheLevel::Normal => 512,
            CacheLevel::Small => 1024,
            CacheLevel::Tiny => 2048,
        }
    }

    fn code(self) -> u32 {
        match self {
            CacheLevel::Huge => 0x01,
            CacheLevel::Large => 0x02,
            CacheLevel::Normal => 0x04,
            CacheLevel::Small => 0x08,
            CacheLevel::Tiny => 0x10,
        }
    }

    fn from_code(code: u32) -> Result<Self> {
        match code {
            0x01 => Ok(CacheLevel::Huge),
            0x02 => Ok(CacheLevel::Large),
            0x04 => Ok(CacheLevel::Normal),
            0x08 => Ok(CacheLevel::Small),
            0x10 => Ok(CacheLevel::Tiny),
            _ => Err(Error::invalid_format("unknown cache level")),
        }
    }
}

/// Build-time configuration for [`crate::Trie::build`].
#[derive(Clone, Copy, Debug)]
pub struct TrieConfig {
    /// Recursion depth of the nested-trie family, `1..=16`.
    /// Deeper nesting shrinks the image and slows queries.
    pub num_tries: usize,
    /// Suffix storage mode at the deepest level.
    pub tail_mode: TailMode,
    /// Sibling arrangement.
    pub node_order: NodeOrder,
    /// Transition-cache sizing.
    pub cache_level: CacheLevel,
}

impl Default for TrieConfig {
    fn default() -> Self {
        TrieConfig {
            num_tries: 3,
            tail_mode: TailMode::default(),
            node_order: NodeOrder::default(),
            cache_level: CacheLevel::default(),
        }
    }
}

impl TrieConfig {
    /// Deepest nesting the format supports.
    pub const MAX_NUM_TRIES: usize = 16;

    /// Reject out-of-range values before a build starts.
    pub(crate) fn check(&self) -> Result<()> {
        if self.num_tries < 1 || self.num_tries > Self::MAX_NUM_TRIES {
            return Err(Error::invalid_input(format!(
                "num_tries must be in 1..={}, got {}",
                Self::MAX_NUM_TRIES,
                self.num_tries
            )));
        }
        Ok(())
    }

    /// Pack into the serialized flag word.
    pub(crate) fn to_flags(self) -> u32 {
        (self.num_tries as u32 & mask::NUM_TRIES)
            | (self.cache_level.code() << mask::CACHE_LEVEL.trailing_zeros())
            | (self.tail_mode.code() << mask::TAIL_MODE.trailing_zeros())
            | (self.node_order.code() << mask::NODE_ORDER.trailing_zeros())
    }

    /// Unpack from the serialized flag word.
    pub(crate) fn from_flags(flags: u32) -> Result<Self> {
        let num_tries = (flags & mask::NUM_TRIES) as usize;
        if num_tries < 1 || num_tries > Self::MAX_NUM_TRIES {
            return Err(Error::invalid_format("num_tries out of range"));
        }
        Ok(TrieConfig {
            num_tries,
            cache_level: CacheLevel::from_code(
                (flags & mask::CACHE_LEVEL) >> mask::CACHE_LEVEL.trailing_zeros(),
            )?,
            tail_mode: TailMode::from_code(
                (flags & mask::TAIL_MODE) >> mask::TAIL_MODE.trailing_zeros(),
            )?,
            node_order: NodeOrder::from_code(
                (flags & mask::NODE_ORDER) >> mask::NODE_ORDER.trailing_zeros(),
            )?,
        })
    }
}
