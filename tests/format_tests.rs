//! Serialized-image stability and cross-reader equivalence.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use nestrie::bits::BitVec;
use nestrie::{Agent, Keyset, NodeOrder, Trie, TrieConfig};

const WORDS_15: &[&str] = &[
    "a", "app", "apple", "application", "apply", "banana", "band", "bank", "can", "cat", "dog",
    "door", "test", "testing", "trie",
];

fn build_words(words: &[&str], config: &TrieConfig) -> Trie {
    let mut keyset = Keyset::new();
    for word in words {
        keyset.push(word);
    }
    Trie::build(&mut keyset, config).unwrap()
}

fn image(trie: &Trie) -> Vec<u8> {
    let mut bytes = Vec::new();
    trie.write(&mut bytes).unwrap();
    bytes
}

/// Copy an image into leaked 8-aligned memory for `Trie::map`.
fn leak_aligned(bytes: &[u8]) -> &'static [u8] {
    let mut words = vec![0u64; bytes.len().div_ceil(8)];
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), words.as_mut_ptr().cast::<u8>(), bytes.len());
    }
    let leaked = Box::leak(words.into_boxed_slice());
    unsafe { std::slice::from_raw_parts(leaked.as_ptr().cast::<u8>(), bytes.len()) }
}

fn lookup_id(trie: &Trie, key: &str) -> Option<usize> {
    let mut agent = Agent::new();
    agent.set_query(key);
    trie.lookup(&mut agent).unwrap().then(|| agent.key().id())
}

fn all_queries(trie: &Trie) -> Vec<(Option<usize>, Vec<Vec<u8>>, Vec<Vec<u8>>, Vec<u8>)> {
    let mut agent = Agent::new();
    let mut snapshots = Vec::new();
    for query in ["app", "applications", "testing", "zebra", "", "do"] {
        agent.set_query(query);
        let hit = trie.lookup(&mut agent).unwrap().then(|| agent.key().id());

        agent.set_query(query);
        let mut prefixes = Vec::new();
        while trie.common_prefix_search(&mut agent).unwrap() {
            prefixes.push(agent.key().as_bytes().to_vec());
        }

        agent.set_query(query);
        let mut predictions = Vec::new();
        while trie.predictive_search(&mut agent).unwrap() {
            predictions.push(agent.key().as_bytes().to_vec());
        }

        let reversed = if trie.num_keys() > 0 {
            agent.set_query_id(trie.num_keys() - 1);
            trie.reverse_lookup(&mut agent).unwrap();
            agent.key().as_bytes().to_vec()
        } else {
            Vec::new()
        };
        snapshots.push((hit, prefixes, predictions, reversed));
    }
    snapshots
}

// ============================================================================
// Header and image stability
// ============================================================================

#[test]
fn test_image_starts_with_magic() {
    let trie = build_words(WORDS_15, &TrieConfig::default());
    let bytes = image(&trie);
    assert_eq!(&bytes[..16], b"We love Marisa.\n");
}

#[test]
fn test_io_size_matches_image() {
    let trie = build_words(WORDS_15, &TrieConfig::default());
    assert_eq!(image(&trie).len(), trie.io_size());
}

#[test]
fn test_save_load_save_is_byte_identical() {
    let trie = build_words(WORDS_15, &TrieConfig::default());
    let first = image(&trie);
    let loaded = Trie::read(&first[..]).unwrap();
    let second = image(&loaded);
    assert_eq!(first, second);

    let reloaded = Trie::read(&second[..]).unwrap();
    assert_eq!(image(&reloaded), first);
}

#[test]
fn test_permuted_input_same_image_under_label_order() {
    let config = TrieConfig {
        node_order: NodeOrder::Label,
        ..TrieConfig::default()
    };
    let forward = build_words(WORDS_15, &config);

    let mut shuffled: Vec<&str> = WORDS_15.to_vec();
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    for i in (1..shuffled.len()).rev() {
        shuffled.swap(i, rng.gen_range(0..=i));
    }
    assert_ne!(shuffled, WORDS_15);
    let permuted = build_words(&shuffled, &config);

    assert_eq!(image(&forward), image(&permuted));
}

#[test]
fn test_deterministic_rebuild() {
    let first = build_words(WORDS_15, &TrieConfig::default());
    let second = build_words(WORDS_15, &TrieConfig::default());
    assert_eq!(image(&first), image(&second));
}

// ============================================================================
// Load failures
// ============================================================================

#[test]
fn test_load_rejects_bad_magic() {
    let mut bytes = image(&build_words(WORDS_15, &TrieConfig::default()));
    bytes[0] ^= 0xFF;
    assert!(matches!(
        Trie::read(&bytes[..]),
        Err(nestrie::Error::InvalidFormat(_))
    ));
}

#[test]
fn test_load_rejects_truncation() {
    let bytes = image(&build_words(WORDS_15, &TrieConfig::default()));
    for cut in [8, 17, bytes.len() / 2, bytes.len() - 1] {
        assert!(
            matches!(Trie::read(&bytes[..cut]), Err(nestrie::Error::InvalidFormat(_))),
            "cut at {}",
            cut
        );
    }
}

#[test]
fn test_load_rejects_empty() {
    assert!(Trie::read(&[][..]).is_err());
}

// ============================================================================
// Cross-reader equivalence
// ============================================================================

#[test]
fn test_read_mmap_map_agree() {
    let built = build_words(WORDS_15, &TrieConfig::default());
    let bytes = image(&built);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("words.dic");
    assert_eq!(built.save(&path).unwrap(), bytes.len());

    let loaded = Trie::load(&path).unwrap();
    let mapped_file = Trie::mmap(&path).unwrap();
    let mapped_slice = Trie::map(leak_aligned(&bytes)).unwrap();

    let expected = all_queries(&built);
    assert_eq!(all_queries(&loaded), expected);
    assert_eq!(all_queries(&mapped_file), expected);
    assert_eq!(all_queries(&mapped_slice), expected);

    // A mapped dictionary holds almost nothing on the heap.
    assert!(mapped_file.heap_size() < loaded.heap_size());
}

#[test]
fn test_mmap_lookup_every_word() {
    let built = build_words(WORDS_15, &TrieConfig::default());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("words.dic");
    built.save(&path).unwrap();

    let mapped = Trie::mmap(&path).unwrap();
    assert_eq!(mapped.num_keys(), 15);
    for word in WORDS_15 {
        assert_eq!(lookup_id(&mapped, word), lookup_id(&built, word));
    }
}

// ============================================================================
// Randomized invariants
// ============================================================================

#[test]
fn test_rank_select_algebra_random() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for &density in &[0.02, 0.5, 0.97] {
        let mut bv = BitVec::new();
        let mut bits = Vec::new();
        for _ in 0..20_000 {
            let bit = rng.gen_bool(density);
            bv.push(bit);
            bits.push(bit);
        }
        bv.build(true, true);

        for i in (0..=bits.len()).step_by(503) {
            assert_eq!(bv.rank1(i) + bv.rank0(i), i);
        }
        for (p, &bit) in bits.iter().enumerate() {
            if bit {
                assert_eq!(bv.select1(bv.rank1(p + 1) - 1), Some(p));
            }
        }
    }
}

#[test]
fn test_random_keyset_roundtrip() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let mut words: Vec<Vec<u8>> = (0..500)
        .map(|_| {
            let len = rng.gen_range(1..24);
            (0..len).map(|_| rng.gen_range(b'a'..=b'f')).collect()
        })
        .collect();
    words.sort();
    words.dedup();

    let mut keyset = Keyset::new();
    for word in &words {
        keyset.push(word);
    }
    let trie = Trie::build(&mut keyset, &TrieConfig::default()).unwrap();
    assert_eq!(trie.num_keys(), words.len());

    let bytes = image(&trie);
    let loaded = Trie::read(&bytes[..]).unwrap();

    let mut agent = Agent::new();
    for (i, word) in words.iter().enumerate() {
        agent.set_query(word);
        assert!(loaded.lookup(&mut agent).unwrap(), "missing {:?}", word);
        let id = agent.key().id();
        assert_eq!(keyset.id(i), Some(id));

        agent.set_query_id(id);
        loaded.reverse_lookup(&mut agent).unwrap();
        assert_eq!(agent.key().as_bytes(), word.as_slice());
    }
}

#[test]
fn test_random_predictive_matches_filter() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let mut words: Vec<String> = (0..300)
        .map(|_| {
            let len = rng.gen_range(1..10);
            (0..len)
                .map(|_| char::from(rng.gen_range(b'a'..=b'c')))
                .collect()
        })
        .collect();
    words.sort();
    words.dedup();

    let refs: Vec<&str> = words.iter().map(String::as_str).collect();
    let trie = build_words(&refs, &TrieConfig::default());

    let mut agent = Agent::new();
    for prefix in ["a", "ab", "abc", "c", ""] {
        agent.set_query(prefix);
        let mut found = Vec::new();
        while trie.predictive_search(&mut agent).unwrap() {
            found.push(String::from_utf8(agent.key().as_bytes().to_vec()).unwrap());
        }
        let mut expected: Vec<&String> = words.iter().filter(|w| w.starts_with(prefix)).collect();
        // Emission is id order; compare as sets plus uniqueness.
        assert_eq!(found.len(), expected.len(), "prefix {:?}", prefix);
        let mut found_sorted = found.clone();
        found_sorted.sort();
        found_sorted.dedup();
        expected.sort();
        assert_eq!(found_sorted.len(), found.len());
        assert_eq!(
            found_sorted,
            expected.iter().map(|s| s.to_string()).collect::<Vec<_>>()
        );
    }
}
