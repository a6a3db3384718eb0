//! Shared-suffix byte store.
//!
//! Labels too long to recurse into a deeper trie land here. Suffixes that
//! end identically share bytes: entries are sorted by their reversed
//! reading, so a suffix of another entry sits next to it and borrows the
//! longer entry's storage instead of being emitted again.
//!
//! Text mode separates suffixes with a NUL byte; binary mode marks final
//! bytes in a parallel bit vector and is forced whenever a suffix contains
//! a zero byte.

use std::cmp::Ordering;

use super::config::TailMode;
use crate::agent::State;
use crate::bits::BitVec;
use crate::error::{Error, Result};
use crate::io::storage::PodVec;
use crate::io::{Mapper, Reader, Writer};

/// A suffix awaiting storage: the forward byte run plus the caller's
/// index used to report the assigned offset back.
pub(crate) struct TailEntry<'a> {
    pub bytes: &'a [u8],
    pub index: u32,
}

impl TailEntry<'_> {
    /// Byte `i` of the reversed reading (0 is the last byte).
    #[inline]
    fn rev(&self, i: usize) -> u8 {
        self.bytes[self.bytes.len() - 1 - i]
    }

    fn rev_cmp(&self, other: &Self) -> Ordering {
        let (n, m) = (self.bytes.len(), other.bytes.len());
        for i in 0..n.min(m) {
            match self.rev(i).cmp(&other.rev(i)) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        n.cmp(&m)
    }
}

/// Shared-suffix table.
#[derive(Default, Debug)]
pub(crate) struct Tail {
    buf: PodVec<u8>,
    end_flags: BitVec,
}

impl Tail {
    /// Store `entries`, returning the byte offset assigned to each input
    /// index. `mode` is a request; zero bytes force binary mode.
    pub fn build(entries: &mut Vec<TailEntry<'_>>, mode: TailMode) -> (Self, Vec<u32>) {
        let mode = if entries
            .iter()
            .any(|e| e.bytes.contains(&0))
        {
            TailMode::Binary
        } else {
            mode
        };

        entries.sort_by(|a, b| a.rev_cmp(b).then(a.index.cmp(&b.index)));

        let mut tail = Tail::default();
        let mut offsets = vec![0u32; entries.len()];
        // Walk from the back so a shared suffix sees its superstring
        // already emitted.
        let mut last: &[u8] = &[];
        let mut last_offset = 0u32;
        for entry in entries.iter().rev() {
            debug_assert!(!entry.bytes.is_empty());
            let shared = entry.bytes.len() <= last.len()
                && (0..entry.bytes.len())
                    .all(|i| entry.rev(i) == last[last.len() - 1 - i]);
            if shared && !last.is_empty() {
                offsets[entry.index as usize] =
                    last_offset + (last.len() - entry.bytes.len()) as u32;
            } else {
                let offset = tail.buf.len() as u32;
                offsets[entry.index as usize] = offset;
                for &b in entry.bytes {
                    tail.buf.push(b);
                }
                match mode {
                    TailMode::Text => tail.buf.push(0),
                    TailMode::Binary => {
                        for _ in 1..entry.bytes.len() {
                            tail.end_flags.push(false);
                        }
                        tail.end_flags.push(true);
                    }
                }
                last_offset = offset;
                last = entry.bytes;
            }
        }
        if mode == TailMode::Binary {
            tail.end_flags.build(false, false);
        }
        (tail, offsets)
    }

    /// Storage mode, implied by the presence of end flags.
    pub fn mode(&self) -> TailMode {
        if self.end_flags.is_empty() {
            TailMode::Text
        } else {
            TailMode::Binary
        }
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Match the suffix at `offset` as a prefix of the remaining query,
    /// advancing the query cursor over the matched bytes.
    pub fn match_suffix(&self, query: &[u8], state: &mut State, offset: usize) -> bool {
        match self.mode() {
            TailMode::Text => {
                let mut i = offset;
                loop {
                    if i >= self.buf.len() || self.buf[i] == 0 {
                        return i < self.buf.len();
                    }
                    if state.query_pos >= query.len() || query[state.query_pos] != self.buf[i] {
                        return false;
                    }
                    state.query_pos += 1;
                    i += 1;
                }
            }
            TailMode::Binary => {
                let mut i = offset;
                loop {
                    if i >= self.buf.len()
                        || state.query_pos >= query.len()
                        || query[state.query_pos] != self.buf[i]
                    {
                        return false;
                    }
                    state.query_pos += 1;
                    let end = self.end_flags.get(i);
                    i += 1;
                    if end {
                        return true;
                    }
                }
            }
        }
    }

    /// Match like [`match_suffix`](Self::match_suffix) but allow the
    /// suffix to outlast the query; every suffix byte (matched and
    /// residual) is appended to the key buffer.
    pub fn prefix_match_suffix(&self, query: &[u8], state: &mut State, offset: usize) -> bool {
        match self.mode() {
            TailMode::Text => {
                let mut i = offset;
                loop {
                    if i >= self.buf.len() || self.buf[i] == 0 {
                        return i < self.buf.len();
                    }
                    if state.query_pos >= query.len() {
                        while i < self.buf.len() && self.buf[i] != 0 {
                            state.key_buf.push(self.buf[i]);
                            i += 1;
                        }
                        return true;
                    }
                    if query[state.query_pos] != self.buf[i] {
                        return false;
                    }
                    state.key_buf.push(self.buf[i]);
                    state.query_pos += 1;
                    i += 1;
                }
            }
            TailMode::Binary => {
                let mut i = offset;
                loop {
                    if i >= self.buf.len() {
                        return false;
                    }
                    if state.query_pos >= query.len() {
                        loop {
                            state.key_buf.push(self.buf[i]);
                            if self.end_flags.get(i) {
                                return true;
                            }
                            i += 1;
                        }
                    }
                    if query[state.query_pos] != self.buf[i] {
                        return false;
                    }
                    state.key_buf.push(self.buf[i]);
                    state.query_pos += 1;
                    let end = self.end_flags.get(i);
                    i += 1;
                    if end {
                        return true;
                    }
                }
            }
        }
    }

    /// Append the suffix at `offset` to the key buffer.
    pub fn restore_suffix(&self, state: &mut State, offset: usize) {
        match self.mode() {
            TailMode::Text => {
                let mut i = offset;
                while i < self.buf.len() && self.buf[i] != 0 {
                    state.key_buf.push(self.buf[i]);
                    i += 1;
                }
            }
            TailMode::Binary => {
                let mut i = offset;
                loop {
                    state.key_buf.push(self.buf[i]);
                    if self.end_flags.get(i) {
                        break;
                    }
                    i += 1;
                }
            }
        }
    }

    /// Serialized size in bytes.
    pub fn io_size(&self) -> usize {
        self.buf.io_size() + self.end_flags.io_size()
    }

    /// Heap bytes held.
    pub fn heap_size(&self) -> usize {
        self.buf.heap_size() + self.end_flags.heap_size()
    }

    /// Write the image: buffer, then end flags.
    pub fn write<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.write_pod_vec(&self.buf)?;
        self.end_flags.write(writer)?;
        Ok(())
    }

    /// Read from a streamed image.
    pub fn read<R: std::io::Read>(reader: &mut Reader<R>) -> Result<Self> {
        let tail = Tail {
            buf: reader.read_pod_vec()?,
            end_flags: BitVec::read(reader)?,
        };
        tail.validate()?;
        Ok(tail)
    }

    /// Borrow from a mapped image.
    pub fn map(mapper: &mut Mapper<'_>) -> Result<Self> {
        let tail = Tail {
            buf: mapper.map_pod_vec()?,
            end_flags: BitVec::map(mapper)?,
        };
        tail.validate()?;
        Ok(tail)
    }

    /// Every scan over the buffer must terminate inside it: text mode
    /// ends with a NUL, binary mode flags its last byte.
    fn validate(&self) -> Result<()> {
        if self.buf.is_empty() {
            if !self.end_flags.is_empty() {
                return Err(Error::invalid_format("tail: end flags without buffer"));
            }
            return Ok(());
        }
        match self.mode() {
            TailMode::Text => {
                if self.buf[self.buf.len() - 1] != 0 {
                    return Err(Error::invalid_format("tail: text buffer lacks terminator"));
                }
            }
            TailMode::Binary => {
                if self.end_flags.len() != self.buf.len() {
                    return Err(Error::invalid_format("tail: end flags disagree with buffer"));
                }
                if !self.end_flags.get(self.buf.len() - 1) {
                    return Err(Error::invalid_format("tail: last byte is not flagged"));
                }
            }
        }
        Ok(())
    }
}
