//! End-to-end dictionary behavior.

use nestrie::{Agent, Keyset, NodeOrder, TailMode, Trie, TrieConfig};

const WORDS_7: &[&str] = &["a", "app", "apple", "application", "apply", "banana", "band"];

const WORDS_15: &[&str] = &[
    "a", "app", "apple", "application", "apply", "banana", "band", "bank", "can", "cat", "dog",
    "door", "test", "testing", "trie",
];

fn build_from(words: &[&str], config: &TrieConfig) -> (Trie, Keyset) {
    let mut keyset = Keyset::new();
    for word in words {
        keyset.push(word);
    }
    let trie = Trie::build(&mut keyset, config).unwrap();
    (trie, keyset)
}

fn lookup_id(trie: &Trie, key: impl AsRef<[u8]>) -> Option<usize> {
    let mut agent = Agent::new();
    agent.set_query(key);
    trie.lookup(&mut agent).unwrap().then(|| agent.key().id())
}

fn collect_prefixes(trie: &Trie, query: &str) -> Vec<String> {
    let mut agent = Agent::new();
    agent.set_query(query);
    let mut found = Vec::new();
    while trie.common_prefix_search(&mut agent).unwrap() {
        found.push(String::from_utf8(agent.key().as_bytes().to_vec()).unwrap());
    }
    found
}

fn collect_predictions(trie: &Trie, query: &str) -> Vec<(usize, String)> {
    let mut agent = Agent::new();
    agent.set_query(query);
    let mut found = Vec::new();
    while trie.predictive_search(&mut agent).unwrap() {
        found.push((
            agent.key().id(),
            String::from_utf8(agent.key().as_bytes().to_vec()).unwrap(),
        ));
    }
    found
}

fn reverse(trie: &Trie, id: usize) -> Vec<u8> {
    let mut agent = Agent::new();
    agent.set_query_id(id);
    trie.reverse_lookup(&mut agent).unwrap();
    agent.key().as_bytes().to_vec()
}

// ============================================================================
// Lookup
// ============================================================================

#[test]
fn test_two_keys_exact_match_only() {
    let (trie, _) = build_from(&["a", "app"], &TrieConfig::default());
    assert!(lookup_id(&trie, "app").is_some());
    assert!(lookup_id(&trie, "a").is_some());
    assert!(lookup_id(&trie, "ap").is_none());
    assert!(lookup_id(&trie, "appl").is_none());
    assert!(lookup_id(&trie, "b").is_none());
    assert!(lookup_id(&trie, "").is_none());
}

#[test]
fn test_seven_keys_all_found_with_distinct_ids() {
    let (trie, _) = build_from(WORDS_7, &TrieConfig::default());
    assert_eq!(trie.num_keys(), 7);
    let mut ids: Vec<usize> = WORDS_7
        .iter()
        .map(|w| lookup_id(&trie, w).unwrap_or_else(|| panic!("missing {:?}", w)))
        .collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 7);
    assert!(ids.iter().all(|&id| id < 7));
}

#[test]
fn test_lookup_rejects_neighbors() {
    let (trie, _) = build_from(WORDS_7, &TrieConfig::default());
    for miss in ["ap", "appl", "applications", "ban", "bandit", "z", ""] {
        assert!(lookup_id(&trie, miss).is_none(), "false hit for {:?}", miss);
    }
}

#[test]
fn test_every_depth_agrees() {
    for num_tries in [1, 2, 3, 4, 16] {
        let config = TrieConfig {
            num_tries,
            ..TrieConfig::default()
        };
        let (trie, _) = build_from(WORDS_15, &config);
        for word in WORDS_15 {
            let id = lookup_id(&trie, word)
                .unwrap_or_else(|| panic!("missing {:?} at depth {}", word, num_tries));
            assert_eq!(reverse(&trie, id), word.as_bytes(), "depth {}", num_tries);
        }
    }
}

#[test]
fn test_label_order_build() {
    let config = TrieConfig {
        node_order: NodeOrder::Label,
        ..TrieConfig::default()
    };
    let (trie, _) = build_from(WORDS_15, &config);
    for word in WORDS_15 {
        assert!(lookup_id(&trie, word).is_some());
    }
}

// ============================================================================
// Reverse lookup
// ============================================================================

#[test]
fn test_reverse_is_inverse_of_lookup() {
    let (trie, _) = build_from(WORDS_15, &TrieConfig::default());
    for id in 0..trie.num_keys() {
        let bytes = reverse(&trie, id);
        assert_eq!(lookup_id(&trie, &bytes), Some(id));
    }
}

#[test]
fn test_reverse_out_of_range() {
    let (trie, _) = build_from(&["x"], &TrieConfig::default());
    let mut agent = Agent::new();
    agent.set_query_id(1);
    assert!(matches!(
        trie.reverse_lookup(&mut agent),
        Err(nestrie::Error::OutOfRange { id: 1, num_keys: 1 })
    ));
}

#[test]
fn test_keyset_ids_match_lookup() {
    let (trie, keyset) = build_from(WORDS_7, &TrieConfig::default());
    for (i, word) in WORDS_7.iter().enumerate() {
        assert_eq!(keyset.id(i), lookup_id(&trie, word));
    }
}

// ============================================================================
// Common prefix search
// ============================================================================

#[test]
fn test_common_prefix_search_order() {
    let (trie, _) = build_from(WORDS_7, &TrieConfig::default());
    assert_eq!(
        collect_prefixes(&trie, "applications"),
        vec!["a", "app", "application"]
    );
}

#[test]
fn test_common_prefix_lengths_strictly_increase() {
    let (trie, _) = build_from(WORDS_15, &TrieConfig::default());
    for query in ["testing", "bandana", "doors", "a", "catalog"] {
        let found = collect_prefixes(&trie, query);
        for pair in found.windows(2) {
            assert!(pair[0].len() < pair[1].len(), "query {:?}: {:?}", query, found);
        }
        for prefix in &found {
            assert!(query.starts_with(prefix.as_str()));
            assert!(WORDS_15.contains(&prefix.as_str()));
        }
    }
}

#[test]
fn test_common_prefix_no_match() {
    let (trie, _) = build_from(WORDS_7, &TrieConfig::default());
    assert!(collect_prefixes(&trie, "zebra").is_empty());
    assert!(collect_prefixes(&trie, "").is_empty());
}

#[test]
fn test_empty_key_prefixes_everything() {
    let (trie, _) = build_from(&["", "ab"], &TrieConfig::default());
    assert_eq!(lookup_id(&trie, ""), Some(0));
    let found = collect_prefixes(&trie, "abc");
    assert_eq!(found, vec!["", "ab"]);
}

// ============================================================================
// Predictive search
// ============================================================================

#[test]
fn test_predictive_search_contents_and_order() {
    let (trie, _) = build_from(WORDS_7, &TrieConfig::default());
    let found = collect_predictions(&trie, "app");
    let keys: Vec<&str> = found.iter().map(|(_, k)| k.as_str()).collect();
    assert_eq!(keys, vec!["app", "apple", "application", "apply"]);
    for pair in found.windows(2) {
        assert!(pair[0].0 < pair[1].0, "ids must ascend: {:?}", found);
    }
}

#[test]
fn test_predictive_search_mid_label() {
    let (trie, _) = build_from(WORDS_7, &TrieConfig::default());
    // "appl" ends inside labels; the subtree still enumerates fully.
    let found = collect_predictions(&trie, "appl");
    let keys: Vec<&str> = found.iter().map(|(_, k)| k.as_str()).collect();
    assert_eq!(keys, vec!["apple", "application", "apply"]);
}

#[test]
fn test_predictive_search_exact_leaf() {
    let (trie, _) = build_from(WORDS_7, &TrieConfig::default());
    let found = collect_predictions(&trie, "banana");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].1, "banana");
}

#[test]
fn test_empty_query_enumerates_in_id_order() {
    let (trie, _) = build_from(WORDS_15, &TrieConfig::default());
    let found = collect_predictions(&trie, "");
    assert_eq!(found.len(), 15);
    for (expected, (id, key)) in found.iter().enumerate() {
        assert_eq!(*id, expected);
        assert_eq!(reverse(&trie, *id), key.as_bytes());
    }
}

#[test]
fn test_predictive_no_match() {
    let (trie, _) = build_from(WORDS_7, &TrieConfig::default());
    assert!(collect_predictions(&trie, "bananas").is_empty());
    assert!(collect_predictions(&trie, "q").is_empty());
}

// ============================================================================
// Weights and binary keys
// ============================================================================

#[test]
fn test_weighted_build_same_answers() {
    let mut keyset = Keyset::new();
    keyset.push_weighted("the", 1000.0);
    keyset.push_weighted("them", 500.0);
    keyset.push_weighted("theory", 2.0);
    keyset.push_weighted("rare", 0.5);
    let trie = Trie::build(&mut keyset, &TrieConfig::default()).unwrap();

    for word in ["the", "them", "theory", "rare"] {
        let id = lookup_id(&trie, word).unwrap();
        assert_eq!(reverse(&trie, id), word.as_bytes());
    }
    let found = collect_predictions(&trie, "the");
    assert_eq!(found.len(), 3);
    for pair in found.windows(2) {
        assert!(pair[0].0 < pair[1].0);
    }
}

#[test]
fn test_binary_keys_force_binary_tail() {
    let keys: Vec<&[u8]> = vec![b"ab\0cd", b"ab\0ce", b"\0\0", b"plain"];
    let mut keyset = Keyset::new();
    for key in &keys {
        keyset.push(key);
    }
    let trie = Trie::build(&mut keyset, &TrieConfig::default()).unwrap();
    assert_eq!(trie.tail_mode(), TailMode::Binary);
    for key in &keys {
        let id = lookup_id(&trie, key).unwrap();
        assert_eq!(reverse(&trie, id), *key);
    }
}

#[test]
fn test_explicit_binary_tail_mode() {
    let config = TrieConfig {
        tail_mode: TailMode::Binary,
        ..TrieConfig::default()
    };
    let (trie, _) = build_from(WORDS_15, &config);
    assert_eq!(trie.tail_mode(), TailMode::Binary);
    for word in WORDS_15 {
        assert!(lookup_id(&trie, word).is_some());
    }
}

// ============================================================================
// Agent reuse
// ============================================================================

#[test]
fn test_agent_reuse_across_operations() {
    let (trie, _) = build_from(WORDS_7, &TrieConfig::default());
    let mut agent = Agent::new();

    agent.set_query("app");
    assert!(trie.lookup(&mut agent).unwrap());

    // Interleave: start a prefix enumeration, abandon it, look up again.
    agent.set_query("applications");
    assert!(trie.common_prefix_search(&mut agent).unwrap());
    assert_eq!(agent.key().as_bytes(), b"a");

    agent.set_query("banana");
    assert!(trie.lookup(&mut agent).unwrap());

    agent.set_query("applications");
    let mut found = Vec::new();
    while trie.common_prefix_search(&mut agent).unwrap() {
        found.push(agent.key().as_bytes().to_vec());
    }
    assert_eq!(found.len(), 3);
}

#[test]
fn test_unbuilt_facade_reports_not_built() {
    let trie = Trie::new();
    let mut agent = Agent::new();
    agent.set_query("x");
    assert!(matches!(trie.lookup(&mut agent), Err(nestrie::Error::NotBuilt)));
    assert_eq!(trie.num_keys(), 0);
}
