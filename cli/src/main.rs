mod attack;
mod benchmark;
mod info;

use std::{
    collections::HashSet,
    fs::File,
    io::BufReader,
    path::PathBuf,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::{value_parser, Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use hashaudit_core::{
    EngineConfig, EngineConfigBuilder, HashTarget, HybridMode, HybridOrder, InsertionPoint,
    WordlistEncoding, DEFAULT_CHUNK_SIZE,
};

use attack::{dictionary, hybrid, mask};
use benchmark::benchmark;
use info::info;

/// Password hash auditing with dictionary, mask and hybrid attacks.
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    commands: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Dictionary(Dictionary),
    Mask(Mask),
    Hybrid(Hybrid),
    Benchmark(Benchmark),
    /// List the supported algorithms, attack modes, mask placeholders and rules.
    Info,
}

/// The hash to audit.
#[derive(Args)]
pub struct Target {
    /// The hash algorithm: ntlm, md4, md5, sha1, sha2-224, sha2-256, sha2-384, sha2-512,
    /// sha3-224, sha3-256, sha3-384, sha3-512, bcrypt or pbkdf2.
    #[clap(value_parser)]
    algorithm: String,

    /// The digest to audit. Hexadecimal for the fast hashes,
    /// `$2b$<cost>$<salt><hash>` for bcrypt and
    /// `pbkdf2:<algorithm>:<iterations>:<salt>:<key>` for PBKDF2.
    /// With `--hash-file`, a file of digests, one per line.
    #[clap(value_parser)]
    digest: String,

    /// Audit every digest of the file given in place of the digest.
    #[clap(long, value_parser)]
    hash_file: bool,
}

impl Target {
    /// The targets to audit, in order and without duplicates.
    fn parse(&self) -> Result<Vec<HashTarget>> {
        if !self.hash_file {
            let target =
                HashTarget::parse(&self.algorithm, &self.digest).context("Invalid hash target")?;
            return Ok(vec![target]);
        }

        let file = File::open(&self.digest)
            .with_context(|| format!("Unable to open the hash file {}", self.digest))?;
        let mut targets = HashTarget::parse_list(&self.algorithm, BufReader::new(file))
            .with_context(|| format!("Invalid hash file {}", self.digest))?;

        // the same hash is only attacked once
        let mut seen = HashSet::new();
        targets.retain(|target| seen.insert(target.digest().to_owned()));

        Ok(targets)
    }
}

/// Settings of the scheduler.
#[derive(Args)]
pub struct Engine {
    /// The number of worker threads. Defaults to the number of logical cores.
    #[clap(short, long, value_parser = value_parser!(u64).range(1..))]
    workers: Option<u64>,

    /// Give up after this many seconds.
    #[clap(short, long, value_parser)]
    timeout: Option<u64>,

    /// The maximum number of candidates in a chunk of work.
    #[clap(long, value_parser = value_parser!(u64).range(1..), default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: u64,

    /// Do not display the progress.
    #[clap(short, long, value_parser)]
    quiet: bool,
}

impl Engine {
    fn config(&self) -> Result<EngineConfig> {
        let mut builder = EngineConfigBuilder::new()
            .timeout(self.timeout.map(Duration::from_secs))
            .chunk_size(self.chunk_size);

        if let Some(workers) = self.workers {
            builder = builder.workers(workers as usize);
        }

        builder.build().context("Invalid engine settings")
    }
}

/// The encoding of a wordlist.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum EncodingArg {
    Utf8,
    Latin1,
}

impl From<EncodingArg> for WordlistEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Utf8 => WordlistEncoding::Utf8,
            EncodingArg::Latin1 => WordlistEncoding::Latin1,
        }
    }
}

/// Try every word of a wordlist, and their mutations.
#[derive(Args)]
pub struct Dictionary {
    #[clap(flatten)]
    target: Target,

    /// The wordlist, one word per line.
    #[clap(value_parser)]
    wordlist: PathBuf,

    /// The mutation rules to apply, in order. Defaults to the standard catalog.
    #[clap(short, long, value_delimiter = ',', conflicts_with = "no_rules")]
    rules: Vec<String>,

    /// Try the words as they are.
    #[clap(long, value_parser)]
    no_rules: bool,

    /// Drop the duplicated mutations of a word.
    #[clap(long, value_parser)]
    dedup: bool,

    #[clap(short, long, value_enum, default_value_t = EncodingArg::Utf8)]
    encoding: EncodingArg,

    #[clap(flatten)]
    engine: Engine,
}

/// Try every candidate of a mask, such as `?u?l?l?l?d?d`.
#[derive(Args)]
pub struct Mask {
    #[clap(flatten)]
    target: Target,

    /// The mask. Placeholders are ?l ?u ?d ?s ?a ?b ?h and ?H.
    #[clap(value_parser)]
    pattern: String,

    /// The minimum candidate length. Defaults to the length of the mask.
    #[clap(long, value_parser)]
    min_length: Option<usize>,

    /// The maximum candidate length. Defaults to the length of the mask.
    /// The mask is repeated for lengths longer than itself.
    #[clap(long, value_parser)]
    max_length: Option<usize>,

    #[clap(flatten)]
    engine: Engine,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum HybridModeArg {
    /// A word followed or preceded by a mask candidate.
    DictionaryMask,
    /// A mask candidate inserted in a word.
    MaskDictionary,
    /// The wordlist with all the rules, then the mask alone.
    RulesBrute,
}

impl From<HybridModeArg> for HybridMode {
    fn from(arg: HybridModeArg) -> Self {
        match arg {
            HybridModeArg::DictionaryMask => HybridMode::DictionaryMask,
            HybridModeArg::MaskDictionary => HybridMode::MaskDictionary,
            HybridModeArg::RulesBrute => HybridMode::RulesBrute,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OrderArg {
    Both,
    Append,
    Prepend,
}

impl From<OrderArg> for HybridOrder {
    fn from(arg: OrderArg) -> Self {
        match arg {
            OrderArg::Both => HybridOrder::Both,
            OrderArg::Append => HybridOrder::Append,
            OrderArg::Prepend => HybridOrder::Prepend,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum InsertionPointArg {
    Prefix,
    Suffix,
    Midpoint,
}

impl From<InsertionPointArg> for InsertionPoint {
    fn from(arg: InsertionPointArg) -> Self {
        match arg {
            InsertionPointArg::Prefix => InsertionPoint::Prefix,
            InsertionPointArg::Suffix => InsertionPoint::Suffix,
            InsertionPointArg::Midpoint => InsertionPoint::Midpoint,
        }
    }
}

/// Combine the words of a wordlist with the candidates of a mask.
#[derive(Args)]
pub struct Hybrid {
    #[clap(flatten)]
    target: Target,

    #[clap(value_enum)]
    mode: HybridModeArg,

    /// The wordlist, one word per line.
    #[clap(value_parser)]
    wordlist: PathBuf,

    /// The mask. Placeholders are ?l ?u ?d ?s ?a ?b ?h and ?H.
    #[clap(value_parser)]
    pattern: String,

    /// Which sides of the word the candidates are attached to, in dictionary-mask mode.
    #[clap(long, value_enum, default_value_t = OrderArg::Both)]
    order: OrderArg,

    /// Where the candidates are inserted in the word, in mask-dictionary mode.
    #[clap(long, value_enum, value_delimiter = ',', default_values_t = [InsertionPointArg::Prefix, InsertionPointArg::Suffix, InsertionPointArg::Midpoint])]
    insertion_points: Vec<InsertionPointArg>,

    /// The mutation rules of the wordlist phase, in rules-brute mode.
    #[clap(short, long, value_delimiter = ',')]
    rules: Vec<String>,

    #[clap(short, long, value_enum, default_value_t = EncodingArg::Utf8)]
    encoding: EncodingArg,

    #[clap(flatten)]
    engine: Engine,
}

/// Measure the verification rate of the algorithms and estimate crack times.
#[derive(Args)]
pub struct Benchmark {
    /// The algorithms to benchmark. Defaults to every algorithm.
    #[clap(value_delimiter = ',')]
    algorithms: Vec<String>,

    /// The bcrypt cost of the sample hash.
    #[clap(long, value_parser)]
    bcrypt_cost: Option<u32>,

    /// The PBKDF2 iteration count of the sample hash.
    #[clap(long, value_parser = value_parser!(u32).range(1..))]
    pbkdf2_iterations: Option<u32>,

    /// The minimum duration of each benchmark, in milliseconds.
    #[clap(short, long, value_parser, default_value_t = 1_000)]
    duration: u64,

    /// Estimate the time needed to exhaust this mask.
    #[clap(short, long, value_parser)]
    mask: Option<String>,

    /// The minimum candidate length of the mask.
    #[clap(long, value_parser, requires = "mask")]
    min_length: Option<usize>,

    /// The maximum candidate length of the mask.
    #[clap(long, value_parser, requires = "mask")]
    max_length: Option<usize>,

    /// The number of worker threads of the estimate. Defaults to the number of logical cores.
    #[clap(short, long, value_parser = value_parser!(u64).range(1..))]
    workers: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.commands {
        Commands::Dictionary(dict) => dictionary(dict)?,
        Commands::Mask(mask_args) => mask(mask_args)?,
        Commands::Hybrid(hyb) => hybrid(hyb)?,
        Commands::Benchmark(bench) => benchmark(bench)?,
        Commands::Info => info(),
    }

    Ok(())
}
