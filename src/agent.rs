//! Caller-owned query cursor.
//!
//! An [`Agent`] carries everything one query needs: the query bytes (copied
//! in, so nothing the caller frees can dangle), the result key view, and the
//! traversal state that makes common-prefix and predictive search resumable.
//! A trie is immutable after build and can serve many threads at once as
//! long as each thread brings its own agent.

use std::collections::VecDeque;

/// Query input: either a byte string or a key id.
#[derive(Default, Clone)]
pub struct Query {
    bytes: Vec<u8>,
    id: usize,
}

impl Query {
    /// Query bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Query key id (reverse lookup).
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Query length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True for a zero-length byte query.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn set_bytes(&mut self, bytes: &[u8]) {
        self.bytes.clear();
        self.bytes.extend_from_slice(bytes);
        self.id = 0;
    }

    fn set_id(&mut self, id: usize) {
        self.bytes.clear();
        self.id = id;
    }
}

/// Where the agent's current result key lives.
#[derive(Clone, Copy, PartialEq, Eq)]
enum KeySource {
    /// No result yet.
    None,
    /// A prefix of the query bytes of the given length.
    QueryPrefix(usize),
    /// The state's key buffer.
    Buffer,
}

/// Search phases of the cursor state machine.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Status {
    /// Fresh query; any operation may initialize.
    Ready,
    /// Mid common-prefix enumeration.
    CommonPrefix,
    /// Mid predictive enumeration.
    Predictive,
    /// Common-prefix enumeration exhausted.
    CommonPrefixDone,
    /// Predictive enumeration exhausted.
    PredictiveDone,
}

impl Default for Status {
    fn default() -> Self {
        Status::Ready
    }
}

/// A subtree node awaiting level-order expansion, with its spelled key.
pub(crate) struct QueuedNode {
    pub node: usize,
    pub key: Vec<u8>,
}

/// Expansion cursor over one queued node's children.
pub(crate) struct Frontier {
    /// Spelled key of the parent being expanded.
    pub key: Vec<u8>,
    /// Position of the next sibling edge bit.
    pub louds_pos: usize,
    /// Node id of the next sibling.
    pub child: usize,
    /// Running rank into the link flags, lazily primed.
    pub link_id: usize,
}

/// Per-query scratch owned by the agent.
#[derive(Default)]
pub(crate) struct State {
    pub key_buf: Vec<u8>,
    pub queue: VecDeque<QueuedNode>,
    pub frontier: Option<Frontier>,
    pub node: usize,
    pub query_pos: usize,
    pub status: Status,
}

impl State {
    pub(crate) fn init_lookup(&mut self) {
        self.node = 0;
        self.query_pos = 0;
        self.status = Status::Ready;
    }

    pub(crate) fn init_reverse_lookup(&mut self) {
        self.key_buf.clear();
        self.status = Status::Ready;
    }

    pub(crate) fn init_common_prefix_search(&mut self) {
        self.node = 0;
        self.query_pos = 0;
        self.status = Status::CommonPrefix;
    }

    pub(crate) fn init_predictive_search(&mut self) {
        self.key_buf.clear();
        self.queue.clear();
        self.frontier = None;
        self.node = 0;
        self.query_pos = 0;
        self.status = Status::Predictive;
    }
}

/// Borrowed view of a result key.
///
/// The bytes live inside the agent (its query copy or its key buffer), so a
/// `Key` can never outlive the agent or survive the next search call.
#[derive(Clone, Copy)]
pub struct Key<'a> {
    bytes: &'a [u8],
    id: usize,
}

impl<'a> Key<'a> {
    /// Key bytes.
    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Stable key id.
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True for the empty key.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Reusable per-query cursor.
///
/// # Examples
///
/// ```
/// use nestrie::{Agent, Keyset, Trie, TrieConfig};
///
/// let mut keyset = Keyset::new();
/// keyset.push("app");
/// keyset.push("apple");
/// let trie = Trie::build(&mut keyset, &TrieConfig::default()).unwrap();
///
/// let mut agent = Agent::new();
/// agent.set_query("app");
/// assert!(trie.lookup(&mut agent).unwrap());
/// assert_eq!(agent.key().as_bytes(), b"app");
/// ```
#[derive(Default)]
pub struct Agent {
    query: Query,
    state: State,
    key_source: KeySource,
    key_id: usize,
}

impl Default for KeySource {
    fn default() -> Self {
        KeySource::None
    }
}

impl Agent {
    /// Create an empty agent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a byte-string query, resetting any in-flight enumeration.
    pub fn set_query(&mut self, bytes: impl AsRef<[u8]>) {
        self.query.set_bytes(bytes.as_ref());
        self.state.status = Status::Ready;
        self.key_source = KeySource::None;
    }

    /// Set a key-id query for reverse lookup.
    pub fn set_query_id(&mut self, id: usize) {
        self.query.set_id(id);
        self.state.status = Status::Ready;
        self.key_source = KeySource::None;
    }

    /// The current query.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// The key produced by the last successful search.
    ///
    /// Empty with id 0 before any search succeeds.
    pub fn key(&self) -> Key<'_> {
        let bytes: &[u8] = match self.key_source {
            KeySource::None => &[],
            KeySource::QueryPrefix(len) => &self.query.bytes[..len],
            KeySource::Buffer => &self.state.key_buf,
        };
        Key {
            bytes,
            id: self.key_id,
        }
    }

    /// Drop the query, result, and cursor state.
    pub fn clear(&mut self) {
        *self = Agent::new();
    }

    pub(crate) fn parts_mut(&mut self) -> (&Query, &mut State) {
        (&self.query, &mut self.state)
    }

    pub(crate) fn status(&self) -> Status {
        self.state.status
    }

    pub(crate) fn set_key_from_query_prefix(&mut self, len: usize, id: usize) {
        debug_assert!(len <= self.query.len());
        self.key_source = KeySource::QueryPrefix(len);
        self.key_id = id;
    }

    pub(crate) fn set_key_from_buffer(&mut self, id: usize) {
        self.key_source = KeySource::Buffer;
        self.key_id = id;
    }
}
