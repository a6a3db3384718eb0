//! # nestrie
//!
//! Static, read-mostly dictionary engine: a recursively-nested LOUDS trie
//! with tail-suffix sharing. Stores a set of byte strings in near-minimal
//! space and answers four query classes at O(key length) cost.
//!
//! ## Module Organization
//!
//! - [`bits`] - Bitvector with O(1) rank / O(log n) select, packed integers
//! - [`io`] - One framed, byte-exact image; streamed, copied, or mapped
//! - Dictionary surface: [`Trie`], [`Keyset`], [`Agent`], [`TrieConfig`]
//!
//! ## Quick Start
//!
//! ```
//! use nestrie::{Agent, Keyset, Trie, TrieConfig};
//!
//! let mut keyset = Keyset::new();
//! for word in ["app", "apple", "apply"] {
//!     keyset.push(word);
//! }
//! let trie = Trie::build(&mut keyset, &TrieConfig::default()).unwrap();
//!
//! // Exact lookup returns a stable id...
//! let mut agent = Agent::new();
//! agent.set_query("apple");
//! assert!(trie.lookup(&mut agent).unwrap());
//! let id = agent.key().id();
//!
//! // ...and the id restores the key.
//! agent.set_query_id(id);
//! trie.reverse_lookup(&mut agent).unwrap();
//! assert_eq!(agent.key().as_bytes(), b"apple");
//! ```
//!
//! ## Concurrency
//!
//! A built dictionary is immutable; share it freely across threads for
//! read-only queries, giving each thread its own [`Agent`] (agents carry
//! all per-query scratch and cursor state).
//!
//! ## Durability
//!
//! [`Trie::save`] writes a deterministic little-endian image opening with
//! a 16-byte magic header. [`Trie::load`], [`Trie::mmap`], and
//! [`Trie::map`] rebuild dictionaries that behave identically under every
//! query.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bits;
pub mod io;

mod agent;
mod error;
mod keyset;
mod trie;

pub use agent::{Agent, Key, Query};
pub use error::{Error, Result};
pub use keyset::Keyset;
pub use trie::{CacheLevel, NodeOrder, TailMode, Trie, TrieConfig};
