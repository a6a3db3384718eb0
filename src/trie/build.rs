//! Level-order patricia construction of the nested trie family.
//!
//! Each level consumes a batch of keys and emits LOUDS bits, per-node
//! labels, and a batch of multi-byte labels for the level below. The first
//! level reads the input keys forward; every deeper level reads its labels
//! backward, which is what lets a child trie spell a label in forward query
//! order while being walked child-to-parent.

use std::collections::VecDeque;

use tracing::debug;

use super::cache::{slot_by_child, slot_by_edge, CacheSlot, EMPTY_EXTRA};
use super::config::{NodeOrder, TrieConfig};
use super::louds::LoudsTrie;
use super::tail::{Tail, TailEntry};
use crate::bits::{BitVec, PackedVec};
use crate::error::{Error, Result};
use crate::keyset::Keyset;

/// A contiguous run of sorted keys sharing their first `key_pos` bytes.
#[derive(Clone, Copy)]
struct Range {
    begin: usize,
    end: usize,
    key_pos: usize,
}

/// One key as a level sees it: a reading order over some bytes, a weight,
/// the batch position it arrived at, and the node where it terminated.
trait BuildKey<'a>: Copy {
    fn len(&self) -> usize;
    fn at(&self, i: usize) -> u8;
    fn weight(&self) -> f32;
    fn id(&self) -> usize;
    fn set_id(&mut self, id: usize);
    fn terminal(&self) -> usize;
    fn set_terminal(&mut self, node: usize);
    /// Positions `[begin, end)` of this reading, as next-level input.
    fn chunk(&self, begin: usize, end: usize, weight: f32) -> RevKey<'a>;
}

/// Forward reader over an input key (first level only).
#[derive(Clone, Copy)]
struct FwdKey<'a> {
    bytes: &'a [u8],
    weight: f32,
    id: u32,
    terminal: u32,
}

impl<'a> BuildKey<'a> for FwdKey<'a> {
    #[inline]
    fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    fn at(&self, i: usize) -> u8 {
        self.bytes[i]
    }

    #[inline]
    fn weight(&self) -> f32 {
        self.weight
    }

    #[inline]
    fn id(&self) -> usize {
        self.id as usize
    }

    #[inline]
    fn set_id(&mut self, id: usize) {
        self.id = id as u32;
    }

    #[inline]
    fn terminal(&self) -> usize {
        self.terminal as usize
    }

    #[inline]
    fn set_terminal(&mut self, node: usize) {
        self.terminal = node as u32;
    }

    #[inline]
    fn chunk(&self, begin: usize, end: usize, weight: f32) -> RevKey<'a> {
        RevKey {
            bytes: &self.bytes[begin..end],
            weight,
            id: 0,
            terminal: 0,
        }
    }
}

/// Backward reader over a label chunk (all deeper levels).
///
/// `bytes` is the underlying forward run; position 0 of the reading is its
/// last byte. Taking a chunk of a backward reading keeps the direction, so
/// the orientation flips exactly once between the first and second level.
#[derive(Clone, Copy)]
struct RevKey<'a> {
    bytes: &'a [u8],
    weight: f32,
    id: u32,
    terminal: u32,
}

impl<'a> BuildKey<'a> for RevKey<'a> {
    #[inline]
    fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    fn at(&self, i: usize) -> u8 {
        self.bytes[self.bytes.len() - 1 - i]
    }

    #[inline]
    fn weight(&self) -> f32 {
        self.weight
    }

    #[inline]
    fn id(&self) -> usize {
        self.id as usize
    }

    #[inline]
    fn set_id(&mut self, id: usize) {
        self.id = id as u32;
    }

    #[inline]
    fn terminal(&self) -> usize {
        self.terminal as usize
    }

    #[inline]
    fn set_terminal(&mut self, node: usize) {
        self.terminal = node as u32;
    }

    #[inline]
    fn chunk(&self, begin: usize, end: usize, weight: f32) -> RevKey<'a> {
        let n = self.bytes.len();
        RevKey {
            bytes: &self.bytes[n - end..n - begin],
            weight,
            id: 0,
            terminal: 0,
        }
    }
}

/// Build the whole nested family from a keyset and hand the assigned key
/// ids back to it.
pub(crate) fn build_trie(keyset: &mut Keyset, config: &TrieConfig) -> Result<LoudsTrie> {
    config.check()?;
    if keyset.is_empty() {
        return Err(Error::invalid_input("cannot build from an empty keyset"));
    }

    let (mut root, pairs) = {
        let mut keys: Vec<FwdKey<'_>> = (0..keyset.len())
            .map(|i| FwdKey {
                bytes: keyset.bytes(i),
                weight: keyset.weight(i),
                id: i as u32,
                terminal: 0,
            })
            .collect();

        {
            let mut sorted: Vec<&[u8]> = keys.iter().map(|k| k.bytes).collect();
            sorted.sort();
            if let Some(dup) = sorted.windows(2).find(|w| w[0] == w[1]) {
                return Err(Error::invalid_input(format!(
                    "duplicate key: {:?}",
                    String::from_utf8_lossy(dup[0])
                )));
            }
        }

        let (level, terminals) = build_level(&mut keys, config, 1)?;

        // Terminal node per key, ordered by node id; the k-th terminal in
        // level order receives key id k.
        let mut pairs: Vec<(u32, u32)> = terminals
            .iter()
            .enumerate()
            .map(|(i, &node)| (node, i as u32))
            .collect();
        pairs.sort_unstable();
        (level, pairs)
    };

    let num_nodes = root.louds.len() / 2;
    let mut terminal_flags = BitVec::new();
    let mut node = 0usize;
    for &(terminal, _) in &pairs {
        while node < terminal as usize {
            terminal_flags.push(false);
            node += 1;
        }
        terminal_flags.push(true);
        node += 1;
    }
    while node < num_nodes {
        terminal_flags.push(false);
        node += 1;
    }
    terminal_flags.build(false, true);
    root.terminal_flags = terminal_flags;

    for &(terminal, input) in &pairs {
        keyset.set_id(input as usize, root.terminal_flags.rank1(terminal as usize));
    }

    debug!(
        num_keys = keyset.len(),
        num_tries = root.config.num_tries,
        num_nodes = root.num_nodes_total(),
        io_size = root.io_size(),
        "built trie"
    );
    Ok(root)
}

/// Build one level. Returns the level and, per input key (in batch
/// order), the node id where that key terminated.
fn build_level<'a, T: BuildKey<'a>>(
    keys: &mut Vec<T>,
    config: &TrieConfig,
    level: usize,
) -> Result<(LoudsTrie, Vec<u32>)> {
    for (i, key) in keys.iter_mut().enumerate() {
        key.set_id(i);
    }
    keys.sort_by(|a, b| {
        let (n, m) = (a.len(), b.len());
        for i in 0..n.min(m) {
            match a.at(i).cmp(&b.at(i)) {
                std::cmp::Ordering::Equal => {}
                ord => return ord,
            }
        }
        n.cmp(&m)
    });

    let mut cache_size = if level == 1 { 256usize } else { 1 };
    while cache_size < keys.len() / config.cache_level.divisor() {
        cache_size *= 2;
    }
    let cache_mask = cache_size - 1;
    let mut cache = vec![CacheSlot::default(); cache_size];
    let mut cache_weights = vec![f32::MIN; cache_size];

    let mut louds = BitVec::new();
    louds.push(true);
    louds.push(false);
    let mut link_flags = BitVec::new();
    link_flags.push(false);
    let mut bases: Vec<u8> = vec![0];
    let mut num_l1_nodes = 0usize;

    let mut next_keys: Vec<RevKey<'a>> = Vec::new();
    let mut queue: VecDeque<Range> = VecDeque::new();
    let mut groups: Vec<(Range, f32)> = Vec::new();
    queue.push_back(Range {
        begin: 0,
        end: keys.len(),
        key_pos: 0,
    });

    while let Some(mut range) = queue.pop_front() {
        let node_id = bases.len() - queue.len() - 1;

        while range.begin < range.end && keys[range.begin].len() == range.key_pos {
            keys[range.begin].set_terminal(node_id);
            range.begin += 1;
        }
        if range.begin == range.end {
            louds.push(false);
            continue;
        }

        groups.clear();
        let mut begin = range.begin;
        let mut weight = keys[range.begin].weight() as f64;
        for i in range.begin + 1..range.end {
            if keys[i - 1].at(range.key_pos) != keys[i].at(range.key_pos) {
                groups.push((
                    Range {
                        begin,
                        end: i,
                        key_pos: range.key_pos,
                    },
                    weight as f32,
                ));
                begin = i;
                weight = 0.0;
            }
            weight += keys[i].weight() as f64;
        }
        groups.push((
            Range {
                begin,
                end: range.end,
                key_pos: range.key_pos,
            },
            weight as f32,
        ));

        if config.node_order == NodeOrder::Weight {
            groups.sort_by(|a, b| b.1.total_cmp(&a.1));
        }
        if node_id == 0 {
            num_l1_nodes = groups.len();
        }

        for &(group, group_weight) in groups.iter() {
            // Extend the patricia chain while every key in the group
            // agrees on the next byte and none ends inside it.
            let mut key_pos = group.key_pos + 1;
            'extend: while key_pos < keys[group.begin].len() {
                for j in group.begin + 1..group.end {
                    if keys[j - 1].at(key_pos) != keys[j].at(key_pos) {
                        break 'extend;
                    }
                }
                key_pos += 1;
            }

            let child_id = bases.len();
            let slot = if level == 1 {
                slot_by_edge(node_id, keys[group.begin].at(group.key_pos), cache_mask)
            } else {
                slot_by_child(child_id, cache_mask)
            };
            if group_weight > cache_weights[slot] {
                cache[slot].set_parent(node_id);
                cache[slot].set_child(child_id);
                cache_weights[slot] = group_weight;
            }

            if key_pos == group.key_pos + 1 {
                bases.push(keys[group.begin].at(group.key_pos));
                link_flags.push(false);
            } else {
                bases.push(0);
                link_flags.push(true);
                next_keys.push(keys[group.begin].chunk(group.key_pos, key_pos, group_weight));
            }
            louds.push(true);
            queue.push_back(Range {
                begin: group.begin,
                end: group.end,
                key_pos,
            });
        }
        louds.push(false);
    }

    louds.build(level == 1, true);
    link_flags.build(false, false);

    let mut terminals = vec![0u32; keys.len()];
    for key in keys.iter() {
        terminals[key.id()] = key.terminal() as u32;
    }

    // Descend before wiring links: each linked node stores either the
    // terminal node id of its label in the child trie, or a tail offset.
    let mut next_trie: Option<Box<LoudsTrie>> = None;
    let mut tail = Tail::default();
    let mut links: Vec<u32> = Vec::new();
    if !next_keys.is_empty() {
        if level == config.num_tries {
            let mut entries: Vec<TailEntry<'_>> = next_keys
                .iter()
                .enumerate()
                .map(|(i, k)| TailEntry {
                    bytes: k.bytes,
                    index: i as u32,
                })
                .collect();
            let (built, offsets) = Tail::build(&mut entries, config.tail_mode);
            tail = built;
            links = offsets;
        } else {
            let (sub, sub_terminals) = build_level(&mut next_keys, config, level + 1)?;
            next_trie = Some(Box::new(sub));
            links = sub_terminals;
        }
    }

    let mut extra_values: Vec<u32> = Vec::with_capacity(links.len());
    {
        let mut node = 0usize;
        for &link in &links {
            while !link_flags.get(node) {
                node += 1;
            }
            bases[node] = (link & 0xFF) as u8;
            extra_values.push(link >> 8);
            node += 1;
        }
    }
    let extras = PackedVec::build(&extra_values);

    for slot in cache.iter_mut() {
        if slot.child() == u32::MAX as usize {
            continue;
        }
        let child = slot.child();
        slot.set_base(bases[child]);
        if link_flags.get(child) {
            let extra = extra_values[link_flags.rank1(child)];
            if extra == EMPTY_EXTRA {
                // Indistinguishable from a plain edge; leave the slot vacant.
                *slot = CacheSlot::default();
                continue;
            }
            slot.set_extra(extra);
        } else {
            slot.set_extra(EMPTY_EXTRA);
        }
    }

    // The deepest level knows whether the tail was forced binary; carry
    // the achieved mode back up through the family.
    let achieved_tail_mode = if !tail.is_empty() {
        tail.mode()
    } else if let Some(next) = &next_trie {
        next.config.tail_mode
    } else {
        config.tail_mode
    };
    let achieved = TrieConfig {
        num_tries: 1 + next_trie.as_ref().map_or(0, |t| t.config.num_tries),
        tail_mode: achieved_tail_mode,
        node_order: config.node_order,
        cache_level: config.cache_level,
    };

    debug!(
        level,
        num_keys = keys.len(),
        num_nodes = louds.len() / 2,
        num_links = links.len(),
        tail = !tail.is_empty(),
        "built trie level"
    );

    let trie = LoudsTrie {
        louds,
        terminal_flags: BitVec::new(),
        link_flags,
        bases: bases.into(),
        extras,
        tail,
        next: next_trie,
        cache: cache.into(),
        cache_mask,
        num_l1_nodes,
        config: achieved,
    };
    Ok((trie, terminals))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rev_key_reading() {
        let bytes = b"abcdef";
        let key = RevKey {
            bytes,
            weight: 1.0,
            id: 0,
            terminal: 0,
        };
        assert_eq!(key.at(0), b'f');
        assert_eq!(key.at(5), b'a');

        // Reverse positions [1, 4) cover "cde" read backward.
        let chunk = key.chunk(1, 4, 1.0);
        assert_eq!(chunk.bytes, b"cde");
        assert_eq!(chunk.at(0), b'e');
    }

    #[test]
    fn test_fwd_chunk_becomes_backward() {
        let bytes = b"apple";
        let key = FwdKey {
            bytes,
            weight: 1.0,
            id: 0,
            terminal: 0,
        };
        let chunk = key.chunk(1, 4, 1.0);
        assert_eq!(chunk.bytes, b"ppl");
        assert_eq!(chunk.at(0), b'l');
        assert_eq!(chunk.at(2), b'p');
    }

    #[test]
    fn test_build_rejects_duplicates() {
        let mut keyset = Keyset::new();
        keyset.push("same");
        keyset.push("same");
        let err = build_trie(&mut keyset, &TrieConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_build_rejects_empty_keyset() {
        let mut keyset = Keyset::new();
        let err = build_trie(&mut keyset, &TrieConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_single_key_layout() {
        let mut keyset = Keyset::new();
        keyset.push("a");
        let trie = build_trie(&mut keyset, &TrieConfig::default()).unwrap();
        // Super-root block, root block with one edge, leaf block.
        assert_eq!(trie.louds.len(), 5);
        assert_eq!(trie.num_l1_nodes, 1);
        assert_eq!(trie.terminal_flags.count_ones(), 1);
        assert_eq!(keyset.id(0), Some(0));
    }

    #[test]
    fn test_ids_are_dense_and_unique() {
        let mut keyset = Keyset::new();
        for word in ["banana", "app", "apple", "a", "band"] {
            keyset.push(word);
        }
        build_trie(&mut keyset, &TrieConfig::default()).unwrap();
        let mut ids: Vec<usize> = (0..keyset.len()).map(|i| keyset.id(i).unwrap()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }
}
