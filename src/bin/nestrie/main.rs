//! nestrie CLI: build and query dictionary files over stdin/stdout.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use nestrie::{Agent, CacheLevel, Keyset, NodeOrder, TailMode, Trie, TrieConfig};

#[derive(Debug, Parser)]
#[command(name = "nestrie")]
#[command(about = "Nested LOUDS trie dictionary toolkit", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build a dictionary from keys on stdin (one per line)
    Build(BuildArgs),
    /// Look up stdin lines; prints "<key_id>\t<key>" or "-1\t<key>"
    Lookup(QueryArgs),
    /// Enumerate stored keys that prefix each stdin line
    CommonPrefixSearch(QueryArgs),
    /// Enumerate stored keys that each stdin line prefixes
    PredictiveSearch(QueryArgs),
    /// Restore keys for integer ids on stdin; prints "<id>\t<key>"
    ReverseLookup(QueryArgs),
    /// Print every stored key in key-id order
    Dump(QueryArgs),
}

#[derive(Debug, Parser)]
struct BuildArgs {
    /// Nesting depth of the trie family (1-16)
    #[arg(short = 'n', long, default_value = "3")]
    num_tries: usize,

    /// Suffix storage mode
    #[arg(short = 't', long, default_value = "text")]
    tail_mode: TailModeArg,

    /// Sibling order: weight favors hot keys, label gives byte order
    #[arg(short = 'w', long, default_value = "weight")]
    node_order: NodeOrderArg,

    /// Transition-cache size class
    #[arg(short = 'c', long, default_value = "normal")]
    cache_level: CacheLevelArg,

    /// Output file (stdout when omitted)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct QueryArgs {
    /// Dictionary file
    dict: PathBuf,

    /// Memory-map the dictionary instead of copying it into memory
    #[arg(long)]
    mmap: bool,
}

#[derive(Debug, Clone, ValueEnum)]
enum TailModeArg {
    /// NUL-terminated suffixes (auto-switches when keys hold zero bytes)
    Text,
    /// Bit-vector terminated suffixes
    Binary,
}

#[derive(Debug, Clone, ValueEnum)]
enum NodeOrderArg {
    /// Ascending label bytes
    Label,
    /// Descending accumulated weight
    Weight,
}

#[derive(Debug, Clone, ValueEnum)]
enum CacheLevelArg {
    Huge,
    Large,
    Normal,
    Small,
    Tiny,
}

impl From<TailModeArg> for TailMode {
    fn from(arg: TailModeArg) -> Self {
        match arg {
            TailModeArg::Text => TailMode::Text,
            TailModeArg::Binary => TailMode::Binary,
        }
    }
}

impl From<NodeOrderArg> for NodeOrder {
    fn from(arg: NodeOrderArg) -> Self {
        match arg {
            NodeOrderArg::Label => NodeOrder::Label,
            NodeOrderArg::Weight => NodeOrder::Weight,
        }
    }
}

impl From<CacheLevelArg> for CacheLevel {
    fn from(arg: CacheLevelArg) -> Self {
        match arg {
            CacheLevelArg::Huge => CacheLevel::Huge,
            CacheLevelArg::Large => CacheLevel::Large,
            CacheLevelArg::Normal => CacheLevel::Normal,
            CacheLevelArg::Small => CacheLevel::Small,
            CacheLevelArg::Tiny => CacheLevel::Tiny,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Build(args) => build(args),
        Command::Lookup(args) => lookup(args),
        Command::CommonPrefixSearch(args) => common_prefix_search(args),
        Command::PredictiveSearch(args) => predictive_search(args),
        Command::ReverseLookup(args) => reverse_lookup(args),
        Command::Dump(args) => dump(args),
    }
}

fn open(args: &QueryArgs) -> Result<Trie> {
    let trie = if args.mmap {
        Trie::mmap(&args.dict)
    } else {
        Trie::load(&args.dict)
    };
    trie.with_context(|| format!("failed to open dictionary {}", args.dict.display()))
}

fn build(args: BuildArgs) -> Result<()> {
    let config = TrieConfig {
        num_tries: args.num_tries,
        tail_mode: args.tail_mode.into(),
        node_order: args.node_order.into(),
        cache_level: args.cache_level.into(),
    };

    let mut keyset = Keyset::new();
    for line in std::io::stdin().lock().lines() {
        keyset.push(line.context("failed to read keys from stdin")?);
    }

    let trie = Trie::build(&mut keyset, &config).context("build failed")?;
    let written = match &args.output {
        Some(path) => trie
            .save(path)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => trie.write(std::io::stdout().lock())?,
    };
    eprintln!(
        "✓ {} keys, {} nodes, {} bytes",
        trie.num_keys(),
        trie.num_nodes(),
        written
    );
    Ok(())
}

fn lookup(args: QueryArgs) -> Result<()> {
    let trie = open(&args)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut agent = Agent::new();
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        agent.set_query(&line);
        if trie.lookup(&mut agent)? {
            writeln!(out, "{}\t{}", agent.key().id(), line)?;
        } else {
            writeln!(out, "-1\t{}", line)?;
        }
    }
    Ok(())
}

fn common_prefix_search(args: QueryArgs) -> Result<()> {
    let trie = open(&args)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut agent = Agent::new();
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        agent.set_query(&line);
        let mut results: Vec<(usize, String)> = Vec::new();
        while trie.common_prefix_search(&mut agent)? {
            let key = agent.key();
            results.push((key.id(), String::from_utf8_lossy(key.as_bytes()).into_owned()));
        }
        writeln!(out, "{} found", results.len())?;
        for (id, key) in results {
            writeln!(out, "{}\t{}\t{}", id, key, line)?;
        }
    }
    Ok(())
}

fn predictive_search(args: QueryArgs) -> Result<()> {
    let trie = open(&args)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut agent = Agent::new();
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        agent.set_query(&line);
        let mut results: Vec<(usize, String)> = Vec::new();
        while trie.predictive_search(&mut agent)? {
            let key = agent.key();
            results.push((key.id(), String::from_utf8_lossy(key.as_bytes()).into_owned()));
        }
        writeln!(out, "{} found", results.len())?;
        for (id, key) in results {
            writeln!(out, "{}\t{}\t{}", id, key, line)?;
        }
    }
    Ok(())
}

fn reverse_lookup(args: QueryArgs) -> Result<()> {
    let trie = open(&args)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut agent = Agent::new();
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let id: usize = line
            .trim()
            .parse()
            .with_context(|| format!("not a key id: {:?}", line))?;
        agent.set_query_id(id);
        trie.reverse_lookup(&mut agent)?;
        writeln!(
            out,
            "{}\t{}",
            id,
            String::from_utf8_lossy(agent.key().as_bytes())
        )?;
    }
    Ok(())
}

fn dump(args: QueryArgs) -> Result<()> {
    let trie = open(&args)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut agent = Agent::new();
    // An empty predictive query enumerates the whole dictionary in id order.
    agent.set_query("");
    let mut count = 0usize;
    while trie.predictive_search(&mut agent)? {
        out.write_all(agent.key().as_bytes())?;
        out.write_all(b"\n")?;
        count += 1;
    }
    eprintln!("✓ {} keys", count);
    Ok(())
}
