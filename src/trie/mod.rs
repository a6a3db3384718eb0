//! The dictionary facade and its building blocks.

mod build;
mod cache;
mod config;
mod louds;
mod tail;

pub use config::{CacheLevel, NodeOrder, TailMode, TrieConfig};

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use tracing::debug;

use crate::agent::Agent;
use crate::error::{Error, Result};
use crate::io::{Mapper, Reader, Writer, MAGIC};
use crate::keyset::Keyset;
use louds::LoudsTrie;

/// Static dictionary over a set of byte strings.
///
/// Built once from a [`Keyset`], then immutable. Answers four query
/// classes at cost proportional to the key length, all through a
/// caller-owned [`Agent`]:
///
/// - [`lookup`](Self::lookup) — exact match, yielding a stable key id;
/// - [`reverse_lookup`](Self::reverse_lookup) — key id back to bytes;
/// - [`common_prefix_search`](Self::common_prefix_search) — stored keys
///   that prefix the query, shortest first;
/// - [`predictive_search`](Self::predictive_search) — stored keys the
///   query prefixes, in ascending key-id order.
///
/// A dictionary can be rebuilt from an image three ways with identical
/// query behavior: [`read`](Self::read) copies from any stream,
/// [`mmap`](Self::mmap) maps a file, and [`map`](Self::map) borrows a
/// static slice.
///
/// # Examples
///
/// ```
/// use nestrie::{Agent, Keyset, Trie, TrieConfig};
///
/// let mut keyset = Keyset::new();
/// for word in ["a", "app", "apple"] {
///     keyset.push(word);
/// }
/// let trie = Trie::build(&mut keyset, &TrieConfig::default()).unwrap();
///
/// let mut agent = Agent::new();
/// agent.set_query("applesauce");
/// let mut prefixes = Vec::new();
/// while trie.common_prefix_search(&mut agent).unwrap() {
///     prefixes.push(agent.key().as_bytes().to_vec());
/// }
/// assert_eq!(prefixes, [b"a".to_vec(), b"app".to_vec(), b"apple".to_vec()]);
/// ```
pub struct Trie {
    // `root` may borrow from `mmap`; declaration order makes the
    // borrowing structures drop first.
    root: Option<LoudsTrie>,
    #[allow(dead_code)]
    mmap: Option<Mmap>,
}

impl Default for Trie {
    fn default() -> Self {
        Trie {
            root: None,
            mmap: None,
        }
    }
}

impl Trie {
    /// Create an empty facade.
    ///
    /// Every query on it fails with [`Error::NotBuilt`] until a built or
    /// loaded trie is swapped in via [`std::mem::replace`] or the like;
    /// most callers use [`build`](Self::build)/[`load`](Self::load)
    /// directly instead.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dictionary from a keyset.
    ///
    /// Assigns each keyset entry its key id. Fails on an empty keyset, a
    /// duplicate key, or an out-of-range configuration.
    pub fn build(keyset: &mut Keyset, config: &TrieConfig) -> Result<Self> {
        Ok(Trie {
            root: Some(build::build_trie(keyset, config)?),
            mmap: None,
        })
    }

    /// Read a dictionary image from a stream, copying into owned memory.
    pub fn read<R: std::io::Read>(src: R) -> Result<Self> {
        let mut reader = Reader::new(src);
        reader.read_magic()?;
        let root = LoudsTrie::read(&mut reader)?;
        Self::check_top(&root)?;
        debug!(num_keys = root.num_keys(), "read trie");
        Ok(Trie {
            root: Some(root),
            mmap: None,
        })
    }

    /// Load a dictionary from a file, copying into owned memory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::read(std::io::BufReader::new(File::open(path)?))
    }

    /// Memory-map a dictionary file.
    ///
    /// The map stays alive inside the returned trie; the caller must not
    /// truncate or rewrite the file while the trie exists.
    pub fn mmap(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        let root = {
            // The borrow is released before `mmap` moves into the struct;
            // drop order then keeps the backing bytes alive long enough.
            let bytes: &[u8] = unsafe { std::slice::from_raw_parts(mmap.as_ptr(), mmap.len()) };
            let mut mapper = Mapper::new(bytes)?;
            mapper.map_magic()?;
            LoudsTrie::map(&mut mapper)?
        };
        Self::check_top(&root)?;
        debug!(num_keys = root.num_keys(), io_size = root.io_size(), "mapped trie");
        Ok(Trie {
            root: Some(root),
            mmap: Some(mmap),
        })
    }

    /// Borrow a dictionary from a static in-memory image without copying.
    ///
    /// The slice must be 8-byte aligned.
    pub fn map(bytes: &'static [u8]) -> Result<Self> {
        let mut mapper = Mapper::new(bytes)?;
        mapper.map_magic()?;
        let root = LoudsTrie::map(&mut mapper)?;
        Self::check_top(&root)?;
        Ok(Trie {
            root: Some(root),
            mmap: None,
        })
    }

    /// Write the dictionary image to a stream.
    pub fn write<W: std::io::Write>(&self, dst: W) -> Result<usize> {
        let root = self.root()?;
        let mut writer = Writer::new(dst);
        writer.write_magic()?;
        root.write(&mut writer)?;
        Ok(writer.bytes_written())
    }

    /// Save the dictionary image to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<usize> {
        let file = File::create(path)?;
        let mut buffered = std::io::BufWriter::new(file);
        let written = self.write(&mut buffered)?;
        std::io::Write::flush(&mut buffered)?;
        Ok(written)
    }

    /// Exact lookup of the agent's query. On a hit the agent's key holds
    /// the query bytes and the key id.
    pub fn lookup(&self, agent: &mut Agent) -> Result<bool> {
        let root = self.root()?;
        let found = {
            let (query, state) = agent.parts_mut();
            root.lookup(query.as_bytes(), state)
        };
        match found {
            Some(id) => {
                let len = agent.query().len();
                agent.set_key_from_query_prefix(len, id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Rebuild the key for the agent's query id into the agent's key.
    pub fn reverse_lookup(&self, agent: &mut Agent) -> Result<()> {
        let root = self.root()?;
        let id = agent.query().id();
        if id >= root.num_keys() {
            return Err(Error::OutOfRange {
                id,
                num_keys: root.num_keys(),
            });
        }
        let restored = {
            let (_, state) = agent.parts_mut();
            root.restore_key(id, state)
        };
        if !restored {
            return Err(Error::invalid_format("dictionary structure is corrupt"));
        }
        agent.set_key_from_buffer(id);
        Ok(())
    }

    /// Yield the next stored key that is a prefix of the agent's query.
    ///
    /// Call repeatedly; results come shortest first, and `false` means
    /// the enumeration is done.
    pub fn common_prefix_search(&self, agent: &mut Agent) -> Result<bool> {
        let root = self.root()?;
        let found = {
            let (query, state) = agent.parts_mut();
            root.common_prefix_next(query.as_bytes(), state)
        };
        match found {
            Some((id, len)) => {
                agent.set_key_from_query_prefix(len, id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Yield the next stored key that the agent's query is a prefix of.
    ///
    /// Call repeatedly; results come in ascending key-id order, and
    /// `false` means the enumeration is done.
    pub fn predictive_search(&self, agent: &mut Agent) -> Result<bool> {
        let root = self.root()?;
        let found = {
            let (query, state) = agent.parts_mut();
            root.predictive_next(query.as_bytes(), state)
        };
        match found {
            Some(id) => {
                agent.set_key_from_buffer(id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Number of stored keys.
    pub fn num_keys(&self) -> usize {
        self.root.as_ref().map_or(0, |r| r.num_keys())
    }

    /// Depth of the nested-trie family actually built.
    pub fn num_tries(&self) -> usize {
        self.root.as_ref().map_or(0, |r| r.config.num_tries)
    }

    /// Total nodes across every level.
    pub fn num_nodes(&self) -> usize {
        self.root.as_ref().map_or(0, |r| r.num_nodes_total())
    }

    /// Suffix storage mode of the deepest level.
    pub fn tail_mode(&self) -> TailMode {
        self.root.as_ref().map_or(TailMode::Text, |r| r.config.tail_mode)
    }

    /// Sibling arrangement the dictionary was built with.
    pub fn node_order(&self) -> NodeOrder {
        self.root
            .as_ref()
            .map_or(NodeOrder::Label, |r| r.config.node_order)
    }

    /// Size of the serialized image in bytes, header included.
    pub fn io_size(&self) -> usize {
        self.root.as_ref().map_or(0, |r| MAGIC.len() + r.io_size())
    }

    /// Heap bytes held (zero-ish for a mapped dictionary).
    pub fn heap_size(&self) -> usize {
        self.root.as_ref().map_or(0, |r| r.heap_size())
    }

    fn root(&self) -> Result<&LoudsTrie> {
        self.root.as_ref().ok_or(Error::NotBuilt)
    }

    /// The top level must carry terminals; inner levels must not.
    fn check_top(root: &LoudsTrie) -> Result<()> {
        if root.terminal_flags.is_empty() {
            return Err(Error::invalid_format("top level carries no terminals"));
        }
        let mut level = root.next.as_deref();
        while let Some(trie) = level {
            if !trie.terminal_flags.is_empty() {
                return Err(Error::invalid_format("inner level carries terminals"));
            }
            level = trie.next.as_deref();
        }
        Ok(())
    }
}
