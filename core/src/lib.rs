//! Candidate generation and scheduling engine to audit password hashes
//! with dictionary, mask and hybrid attacks.

pub mod ctx;
pub mod dictionary;
pub mod engine;
pub mod error;
pub mod estimate;
pub mod event;
pub mod generator;
pub mod hybrid;
pub mod rules;
pub mod scheduling;
pub mod target;

use std::time::Duration;

pub use {
    ctx::{AttackConfig, EngineConfig, EngineConfigBuilder},
    dictionary::{
        DictionaryStreamer, FileWordlist, MemoryWordlist, WordlistEncoding, WordlistSource,
    },
    engine::{RunState, WorkScheduler},
    error::{AuditError, AuditResult},
    estimate::{Benchmark, CrackEstimate, Feasibility},
    event::{CrackHandle, CrackResult, Event, ProgressSnapshot},
    generator::{Chunk, Generator},
    hashaudit_commons::{HashType, Mask, MaskSpace, MaskToken},
    hybrid::{HybridCombiner, HybridMode, HybridOptions, HybridOrder, InsertionPoint},
    rules::{Rule, RuleEngine},
    target::{Algorithm, HashTarget, HashVerifier, Pbkdf2Prf, Verify},
};

/// The default maximum number of candidates in a chunk.
pub const DEFAULT_CHUNK_SIZE: u64 = 50_000;

/// The default interval between two progress events.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// The default maximum size of a mask space.
pub const DEFAULT_MAX_SPACE: u64 = u64::MAX;

/// Workers add their attempts to the shared counter every `ATTEMPT_FLUSH_INTERVAL`
/// candidates, or after each candidate when the verifier is slow.
pub const ATTEMPT_FLUSH_INTERVAL: u64 = 1024;
