//! One level of the recursive LOUDS trie, plus the query algorithms that
//! walk the whole family.
//!
//! # Node numbering
//!
//! The bit sequence opens with the artificial block `{1, 0}`; the real root
//! is node 0 and ids are dense in level order (`num_nodes = louds.len() / 2`).
//! For the edge bit at position `p` under parent `n`:
//!
//! - first child edge of `n` sits at `select0(n) + 1`;
//! - the child reached through `p` is `p - n - 1`;
//! - the parent of node `i > 0` is `select1(i) - i - 1`.
//!
//! The top level is searched root-to-leaf; every deeper level stores its
//! labels backward and is only ever walked leaf-to-root, which yields label
//! bytes in forward query order. Links below the deepest level are terminal
//! node ids in the child trie; at the deepest level they are tail offsets.

use super::cache::{slot_by_child, slot_by_edge, CacheSlot, EMPTY_EXTRA};
use super::config::TrieConfig;
use super::tail::Tail;
use crate::agent::{Frontier, QueuedNode, State, Status};
use crate::bits::{BitVec, PackedVec};
use crate::error::{Error, Result};
use crate::io::storage::PodVec;
use crate::io::{Mapper, Reader, Writer};

/// Sentinel for a link rank not yet computed during a sibling scan.
const INVALID_LINK_ID: usize = usize::MAX;

/// One trie level. The top level owns the whole nested family.
#[derive(Debug)]
pub(crate) struct LoudsTrie {
    pub(crate) louds: BitVec,
    pub(crate) terminal_flags: BitVec,
    pub(crate) link_flags: BitVec,
    pub(crate) bases: PodVec<u8>,
    pub(crate) extras: PackedVec,
    pub(crate) tail: Tail,
    pub(crate) next: Option<Box<LoudsTrie>>,
    pub(crate) cache: PodVec<CacheSlot>,
    pub(crate) cache_mask: usize,
    pub(crate) num_l1_nodes: usize,
    pub(crate) config: TrieConfig,
}

impl LoudsTrie {
    /// Number of stored keys (top level only).
    pub fn num_keys(&self) -> usize {
        self.terminal_flags.count_ones()
    }

    /// Nodes in this level.
    pub fn num_nodes(&self) -> usize {
        self.louds.len() / 2
    }

    /// Nodes across the whole family.
    pub fn num_nodes_total(&self) -> usize {
        self.num_nodes() + self.next.as_ref().map_or(0, |t| t.num_nodes_total())
    }

    #[inline]
    fn key_id(&self, node: usize) -> usize {
        self.terminal_flags.rank1(node)
    }

    /// Packed link of a node whose link rank is already known.
    #[inline]
    fn link_at(&self, node: usize, link_id: usize) -> usize {
        self.bases[node] as usize | (self.extras.get(link_id) as usize) << 8
    }

    /// Packed link of an arbitrary linked node.
    #[inline]
    fn link_of(&self, node: usize) -> usize {
        self.link_at(node, self.link_flags.rank1(node))
    }

    /// Advance a running link rank along a sibling scan.
    #[inline]
    fn next_link_id(&self, link_id: usize, node: usize) -> usize {
        if link_id == INVALID_LINK_ID {
            self.link_flags.rank1(node)
        } else {
            link_id + 1
        }
    }

    // ------------------------------------------------------------------
    // Link resolution (dispatch between the child trie and the tail)
    // ------------------------------------------------------------------

    fn match_link(&self, query: &[u8], state: &mut State, link: usize) -> bool {
        match &self.next {
            Some(next) => next.match_up(query, state, link),
            None => self.tail.match_suffix(query, state, link),
        }
    }

    fn prefix_match_link(&self, query: &[u8], state: &mut State, link: usize) -> bool {
        match &self.next {
            Some(next) => next.prefix_match_up(query, state, link),
            None => self.tail.prefix_match_suffix(query, state, link),
        }
    }

    fn restore_link(&self, state: &mut State, link: usize) {
        match &self.next {
            Some(next) => next.restore_up(state, link),
            None => self.tail.restore_suffix(state, link),
        }
    }

    // ------------------------------------------------------------------
    // Inner-level walks (leaf-to-root; labels come out in query order)
    // ------------------------------------------------------------------

    /// Match this level's label ending at `node` against the query,
    /// consuming exactly the label's bytes.
    fn match_up(&self, query: &[u8], state: &mut State, mut node: usize) -> bool {
        debug_assert!(node != 0);
        loop {
            let slot = &self.cache[slot_by_child(node, self.cache_mask)];
            if node == slot.child() {
                if slot.extra() != EMPTY_EXTRA {
                    if !self.match_link(query, state, slot.link()) {
                        return false;
                    }
                } else if state.query_pos < query.len() && query[state.query_pos] == slot.label() {
                    state.query_pos += 1;
                } else {
                    return false;
                }
                node = slot.parent();
                if node == 0 {
                    return true;
                }
            } else {
                if self.link_flags.get(node) {
                    if !self.match_link(query, state, self.link_of(node)) {
                        return false;
                    }
                } else if state.query_pos < query.len()
                    && query[state.query_pos] == self.bases[node]
                {
                    state.query_pos += 1;
                } else {
                    return false;
                }
                if node <= self.num_l1_nodes {
                    return true;
                }
                let Some(pos) = self.louds.select1(node) else {
                    return false;
                };
                node = pos - node - 1;
            }
            if state.query_pos >= query.len() {
                return false;
            }
        }
    }

    /// Like [`match_up`](Self::match_up), but the label may outlast the
    /// query; every label byte lands in the key buffer.
    fn prefix_match_up(&self, query: &[u8], state: &mut State, mut node: usize) -> bool {
        debug_assert!(node != 0);
        loop {
            let slot = &self.cache[slot_by_child(node, self.cache_mask)];
            if node == slot.child() {
                if slot.extra() != EMPTY_EXTRA {
                    if !self.prefix_match_link(query, state, slot.link()) {
                        return false;
                    }
                } else if state.query_pos < query.len() && query[state.query_pos] == slot.label() {
                    state.key_buf.push(slot.label());
                    state.query_pos += 1;
                } else {
                    return false;
                }
                node = slot.parent();
                if node == 0 {
                    return true;
                }
            } else {
                if self.link_flags.get(node) {
                    if !self.prefix_match_link(query, state, self.link_of(node)) {
                        return false;
                    }
                } else if state.query_pos < query.len()
                    && query[state.query_pos] == self.bases[node]
                {
                    state.key_buf.push(self.bases[node]);
                    state.query_pos += 1;
                } else {
                    return false;
                }
                if node <= self.num_l1_nodes {
                    return true;
                }
                let Some(pos) = self.louds.select1(node) else {
                    return false;
                };
                node = pos - node - 1;
            }
            if state.query_pos >= query.len() {
                // Query exhausted inside the label: spell the rest.
                self.restore_up(state, node);
                return true;
            }
        }
    }

    /// Append this level's label ending at `node` to the key buffer.
    fn restore_up(&self, state: &mut State, mut node: usize) {
        debug_assert!(node != 0);
        loop {
            let slot = &self.cache[slot_by_child(node, self.cache_mask)];
            if node == slot.child() {
                if slot.extra() != EMPTY_EXTRA {
                    self.restore_link(state, slot.link());
                } else {
                    state.key_buf.push(slot.label());
                }
                node = slot.parent();
                if node == 0 {
                    return;
                }
            } else {
                if self.link_flags.get(node) {
                    self.restore_link(state, self.link_of(node));
                } else {
                    state.key_buf.push(self.bases[node]);
                }
                if node <= self.num_l1_nodes {
                    return;
                }
                let Some(pos) = self.louds.select1(node) else {
                    return;
                };
                node = pos - node - 1;
            }
        }
    }

    // ------------------------------------------------------------------
    // Top-level descent
    // ------------------------------------------------------------------

    /// Step from `state.node` to the child whose label continues the
    /// query, consuming the label.
    fn find_child(&self, query: &[u8], state: &mut State) -> bool {
        debug_assert!(state.query_pos < query.len());
        let byte = query[state.query_pos];
        let slot = &self.cache[slot_by_edge(state.node, byte, self.cache_mask)];
        if state.node == slot.parent() {
            // A ≥256-slot table gives distinct slots to distinct first
            // bytes under one parent, so this slot's edge starts with
            // `byte` and no sibling can match if it fails.
            if slot.extra() != EMPTY_EXTRA {
                if !self.match_link(query, state, slot.link()) {
                    return false;
                }
                state.node = slot.child();
                return true;
            }
            if slot.label() == byte {
                state.query_pos += 1;
                state.node = slot.child();
                return true;
            }
        }

        let Some(zero) = self.louds.select0(state.node) else {
            return false;
        };
        let mut louds_pos = zero + 1;
        if louds_pos >= self.louds.len() || !self.louds.get(louds_pos) {
            return false;
        }
        let mut node = louds_pos - state.node - 1;
        let mut link_id = INVALID_LINK_ID;
        loop {
            if self.link_flags.get(node) {
                link_id = self.next_link_id(link_id, node);
                let before = state.query_pos;
                if self.match_link(query, state, self.link_at(node, link_id)) {
                    state.node = node;
                    return true;
                }
                if state.query_pos != before {
                    return false;
                }
            } else if self.bases[node] == byte {
                state.query_pos += 1;
                state.node = node;
                return true;
            }
            node += 1;
            louds_pos += 1;
            if louds_pos >= self.louds.len() || !self.louds.get(louds_pos) {
                return false;
            }
        }
    }

    /// [`find_child`](Self::find_child) for predictive descent: spells
    /// every traversed label byte into the key buffer and lets the last
    /// label outlast the query.
    fn predictive_find_child(&self, query: &[u8], state: &mut State) -> bool {
        debug_assert!(state.query_pos < query.len());
        let byte = query[state.query_pos];
        let slot = &self.cache[slot_by_edge(state.node, byte, self.cache_mask)];
        if state.node == slot.parent() {
            if slot.extra() != EMPTY_EXTRA {
                if !self.prefix_match_link(query, state, slot.link()) {
                    return false;
                }
                state.node = slot.child();
                return true;
            }
            if slot.label() == byte {
                state.key_buf.push(byte);
                state.query_pos += 1;
                state.node = slot.child();
                return true;
            }
        }

        let Some(zero) = self.louds.select0(state.node) else {
            return false;
        };
        let mut louds_pos = zero + 1;
        if louds_pos >= self.louds.len() || !self.louds.get(louds_pos) {
            return false;
        }
        let mut node = louds_pos - state.node - 1;
        let mut link_id = INVALID_LINK_ID;
        loop {
            if self.link_flags.get(node) {
                link_id = self.next_link_id(link_id, node);
                let before = state.query_pos;
                if self.prefix_match_link(query, state, self.link_at(node, link_id)) {
                    state.node = node;
                    return true;
                }
                if state.query_pos != before {
                    return false;
                }
            } else if self.bases[node] == byte {
                state.key_buf.push(byte);
                state.query_pos += 1;
                state.node = node;
                return true;
            }
            node += 1;
            louds_pos += 1;
            if louds_pos >= self.louds.len() || !self.louds.get(louds_pos) {
                return false;
            }
        }
    }

    // ------------------------------------------------------------------
    // The four search operations
    // ------------------------------------------------------------------

    /// Exact lookup. Returns the key id.
    pub fn lookup(&self, query: &[u8], state: &mut State) -> Option<usize> {
        state.init_lookup();
        while state.query_pos < query.len() {
            if !self.find_child(query, state) {
                return None;
            }
        }
        if !self.terminal_flags.get(state.node) {
            return None;
        }
        Some(self.key_id(state.node))
    }

    /// Rebuild the key for `id` into the key buffer. False only on a
    /// structurally broken dictionary.
    pub fn restore_key(&self, id: usize, state: &mut State) -> bool {
        state.init_reverse_lookup();
        let Some(mut node) = self.terminal_flags.select1(id) else {
            return false;
        };
        if node == 0 {
            // The empty key terminates at the root.
            return true;
        }
        loop {
            if self.link_flags.get(node) {
                let start = state.key_buf.len();
                self.restore_link(state, self.link_of(node));
                // The walk runs leaf-to-root while links spell forward;
                // flip each chunk so the final reversal lines up.
                state.key_buf[start..].reverse();
            } else {
                state.key_buf.push(self.bases[node]);
            }
            if node <= self.num_l1_nodes {
                state.key_buf.reverse();
                return true;
            }
            let Some(pos) = self.louds.select1(node) else {
                return false;
            };
            node = pos - node - 1;
        }
    }

    /// Yield the next stored key that is a prefix of the query:
    /// `(key id, prefix length)`.
    pub fn common_prefix_next(&self, query: &[u8], state: &mut State) -> Option<(usize, usize)> {
        match state.status {
            Status::CommonPrefixDone => return None,
            Status::CommonPrefix => {}
            _ => {
                state.init_common_prefix_search();
                if self.terminal_flags.get(0) {
                    return Some((self.key_id(0), 0));
                }
            }
        }
        while state.query_pos < query.len() {
            if !self.find_child(query, state) {
                state.status = Status::CommonPrefixDone;
                return None;
            }
            if self.terminal_flags.get(state.node) {
                return Some((self.key_id(state.node), state.query_pos));
            }
        }
        state.status = Status::CommonPrefixDone;
        None
    }

    /// Yield the next stored key extending the query, in ascending
    /// key-id order; the key bytes are left in the key buffer.
    ///
    /// The walk is level-order: after descending to the deepest node that
    /// still matches the query, a FIFO of `(node, spelled key)` pairs
    /// expands the subtree one generation at a time, so emitted ids only
    /// ever grow.
    pub fn predictive_next(&self, query: &[u8], state: &mut State) -> Option<usize> {
        match state.status {
            Status::PredictiveDone => return None,
            Status::Predictive => {}
            _ => {
                state.init_predictive_search();
                while state.query_pos < query.len() {
                    if !self.predictive_find_child(query, state) {
                        state.status = Status::PredictiveDone;
                        return None;
                    }
                }
                state.queue.push_back(QueuedNode {
                    node: state.node,
                    key: state.key_buf.clone(),
                });
                if self.terminal_flags.get(state.node) {
                    return Some(self.key_id(state.node));
                }
            }
        }
        loop {
            if state.frontier.is_none() {
                let Some(parent) = state.queue.pop_front() else {
                    state.status = Status::PredictiveDone;
                    return None;
                };
                let Some(zero) = self.louds.select0(parent.node) else {
                    state.status = Status::PredictiveDone;
                    return None;
                };
                let louds_pos = zero + 1;
                state.frontier = Some(Frontier {
                    child: louds_pos - parent.node - 1,
                    key: parent.key,
                    louds_pos,
                    link_id: INVALID_LINK_ID,
                });
            }
            let Some(mut frontier) = state.frontier.take() else {
                continue;
            };
            if frontier.louds_pos >= self.louds.len() || !self.louds.get(frontier.louds_pos) {
                continue;
            }
            let child = frontier.child;
            frontier.louds_pos += 1;
            frontier.child += 1;

            state.key_buf.clear();
            state.key_buf.extend_from_slice(&frontier.key);
            if self.link_flags.get(child) {
                frontier.link_id = self.next_link_id(frontier.link_id, child);
                self.restore_link(state, self.link_at(child, frontier.link_id));
            } else {
                state.key_buf.push(self.bases[child]);
            }
            state.queue.push_back(QueuedNode {
                node: child,
                key: state.key_buf.clone(),
            });
            state.frontier = Some(frontier);
            if self.terminal_flags.get(child) {
                return Some(self.key_id(child));
            }
        }
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Serialized size in bytes, nested levels included.
    pub fn io_size(&self) -> usize {
        self.louds.io_size()
            + self.terminal_flags.io_size()
            + self.link_flags.io_size()
            + self.bases.io_size()
            + self.extras.io_size()
            + self.tail.io_size()
            + 8
            + self.next.as_ref().map_or(0, |t| t.io_size())
            + self.cache.io_size()
            + 8
    }

    /// Heap bytes held, nested levels included.
    pub fn heap_size(&self) -> usize {
        self.louds.heap_size()
            + self.terminal_flags.heap_size()
            + self.link_flags.heap_size()
            + self.bases.heap_size()
            + self.extras.heap_size()
            + self.tail.heap_size()
            + self.next.as_ref().map_or(0, |t| t.heap_size())
            + self.cache.heap_size()
    }

    /// Write this level and everything below it.
    pub fn write<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        self.louds.write(writer)?;
        self.terminal_flags.write(writer)?;
        self.link_flags.write(writer)?;
        writer.write_pod_vec(&self.bases)?;
        self.extras.write(writer)?;
        self.tail.write(writer)?;
        match &self.next {
            Some(next) => {
                writer.write_u64(1)?;
                next.write(writer)?;
            }
            None => writer.write_u64(0)?,
        }
        writer.write_pod_vec(&self.cache)?;
        writer.write_u32(self.num_l1_nodes as u32)?;
        writer.write_u32(self.config.to_flags())?;
        Ok(())
    }

    /// Read this level and everything below it from a streamed image.
    pub fn read<R: std::io::Read>(reader: &mut Reader<R>) -> Result<Self> {
        let louds = BitVec::read(reader)?;
        let terminal_flags = BitVec::read(reader)?;
        let link_flags = BitVec::read(reader)?;
        let bases = reader.read_pod_vec()?;
        let extras = PackedVec::read(reader)?;
        let tail = Tail::read(reader)?;
        let next = match reader.read_u64()? {
            0 => None,
            1 => Some(Box::new(LoudsTrie::read(reader)?)),
            _ => return Err(Error::invalid_format("bad nested-trie marker")),
        };
        let cache = reader.read_pod_vec()?;
        let num_l1_nodes = reader.read_u32()? as usize;
        let config = TrieConfig::from_flags(reader.read_u32()?)?;
        Self::assemble(
            louds,
            terminal_flags,
            link_flags,
            bases,
            extras,
            tail,
            next,
            cache,
            num_l1_nodes,
            config,
        )
    }

    /// Borrow this level and everything below it from a mapped image.
    pub fn map(mapper: &mut Mapper<'_>) -> Result<Self> {
        let louds = BitVec::map(mapper)?;
        let terminal_flags = BitVec::map(mapper)?;
        let link_flags = BitVec::map(mapper)?;
        let bases = mapper.map_pod_vec()?;
        let extras = PackedVec::map(mapper)?;
        let tail = Tail::map(mapper)?;
        let next = match mapper.map_u64()? {
            0 => None,
            1 => Some(Box::new(LoudsTrie::map(mapper)?)),
            _ => return Err(Error::invalid_format("bad nested-trie marker")),
        };
        let cache = mapper.map_pod_vec()?;
        let num_l1_nodes = mapper.map_u32()? as usize;
        let config = TrieConfig::from_flags(mapper.map_u32()?)?;
        Self::assemble(
            louds,
            terminal_flags,
            link_flags,
            bases,
            extras,
            tail,
            next,
            cache,
            num_l1_nodes,
            config,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        louds: BitVec,
        terminal_flags: BitVec,
        link_flags: BitVec,
        bases: PodVec<u8>,
        extras: PackedVec,
        tail: Tail,
        next: Option<Box<LoudsTrie>>,
        cache: PodVec<CacheSlot>,
        num_l1_nodes: usize,
        config: TrieConfig,
    ) -> Result<Self> {
        let num_nodes = louds.len() / 2;
        if louds.len() != 2 * num_nodes + 1 {
            return Err(Error::invalid_format("louds length must be odd"));
        }
        if bases.len() != num_nodes || link_flags.len() != num_nodes {
            return Err(Error::invalid_format("per-node vectors disagree with louds"));
        }
        if !terminal_flags.is_empty() && terminal_flags.len() != num_nodes {
            return Err(Error::invalid_format("terminal flags disagree with louds"));
        }
        if extras.len() != link_flags.count_ones() {
            return Err(Error::invalid_format("extras disagree with link flags"));
        }
        if cache.is_empty() || !cache.len().is_power_of_two() {
            return Err(Error::invalid_format("cache size must be a power of two"));
        }
        if num_l1_nodes > num_nodes {
            return Err(Error::invalid_format("num_l1_nodes out of range"));
        }
        Ok(LoudsTrie {
            louds,
            terminal_flags,
            link_flags,
            bases,
            extras,
            tail,
            next,
            cache_mask: cache.len() - 1,
            cache,
            num_l1_nodes,
            config,
        })
    }
}
