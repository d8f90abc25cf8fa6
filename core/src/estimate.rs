//! Verifier benchmarks and crack time estimates.

use std::{
    fmt::{self, Display},
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{AuditError, AuditResult},
    target::{Algorithm, HashTarget, HashVerifier, Verify, BCRYPT_COSTS},
};

/// The candidates verified in a loop by a benchmark.
pub const BENCHMARK_CANDIDATES: [&str; 10] = [
    "password", "123456", "qwerty", "admin", "letmein", "welcome", "monkey", "dragon", "master",
    "sunshine",
];

/// The bcrypt cost of a benchmark when none is given.
pub const DEFAULT_BENCHMARK_BCRYPT_COST: u32 = 10;

/// The PBKDF2 iteration count of a benchmark when none is given.
pub const DEFAULT_BENCHMARK_PBKDF2_ITERATIONS: u32 = 100_000;

/// How practical an exhaustive search is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feasibility {
    /// Under a minute.
    Immediate,
    /// Under an hour.
    VeryQuick,
    /// Under a day.
    Quick,
    /// Under a week.
    Moderate,
    /// Under 30 days.
    Slow,
    /// Under a year.
    VerySlow,
    Impractical,
}

impl Feasibility {
    /// Rates the duration of a search. `None` stands for a search that never ends.
    pub fn from_duration(duration: Option<Duration>) -> Self {
        let Some(duration) = duration else {
            return Feasibility::Impractical;
        };

        match duration.as_secs() {
            secs if secs < 60 => Feasibility::Immediate,
            secs if secs < 3_600 => Feasibility::VeryQuick,
            secs if secs < 86_400 => Feasibility::Quick,
            secs if secs < 604_800 => Feasibility::Moderate,
            secs if secs < 2_592_000 => Feasibility::Slow,
            secs if secs < 31_536_000 => Feasibility::VerySlow,
            _ => Feasibility::Impractical,
        }
    }
}

impl Display for Feasibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Feasibility::Immediate => "immediate",
            Feasibility::VeryQuick => "very quick",
            Feasibility::Quick => "quick",
            Feasibility::Moderate => "moderate",
            Feasibility::Slow => "slow",
            Feasibility::VerySlow => "very slow",
            Feasibility::Impractical => "impractical",
        })
    }
}

/// The worst-case duration of an exhaustive search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrackEstimate {
    pub candidates: u64,
    /// Verifications per second.
    pub rate: f64,
    /// `None` when the rate is zero or the duration does not fit a [`Duration`].
    pub duration: Option<Duration>,
    pub feasibility: Feasibility,
}

impl CrackEstimate {
    pub fn new(candidates: u64, rate: f64) -> Self {
        let duration = if rate > 0. && rate.is_finite() {
            Duration::try_from_secs_f64(candidates as f64 / rate).ok()
        } else {
            None
        };

        Self {
            candidates,
            rate,
            duration,
            feasibility: Feasibility::from_duration(duration),
        }
    }
}

/// The single-threaded throughput of a verifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Benchmark {
    pub algorithm: Algorithm,
    pub verifications: u64,
    pub elapsed: Duration,
}

impl Benchmark {
    /// Verifies [`BENCHMARK_CANDIDATES`] in a loop for at least `min_duration`.
    pub fn run<V: Verify>(
        algorithm: Algorithm,
        verifier: &V,
        min_duration: Duration,
    ) -> AuditResult<Self> {
        // warm up
        for candidate in &BENCHMARK_CANDIDATES[..3] {
            verifier.verify(candidate)?;
        }

        let start = Instant::now();
        let mut verifications = 0;

        loop {
            for candidate in BENCHMARK_CANDIDATES {
                verifier.verify(candidate)?;
            }
            verifications += BENCHMARK_CANDIDATES.len() as u64;

            if start.elapsed() >= min_duration {
                break;
            }
        }

        let benchmark = Self {
            algorithm,
            verifications,
            elapsed: start.elapsed(),
        };
        debug!("Benchmarked {algorithm}: {} verifications/s", benchmark.rate());

        Ok(benchmark)
    }

    /// Benchmarks an algorithm against a throwaway target.
    /// `work_factor` is the bcrypt cost or the PBKDF2 iteration count.
    pub fn algorithm(
        algorithm: Algorithm,
        work_factor: Option<u32>,
        min_duration: Duration,
    ) -> AuditResult<Self> {
        let verifier = HashVerifier::new(sample_target(algorithm, work_factor)?);
        Self::run(algorithm, &verifier, min_duration)
    }

    /// Verifications per second.
    pub fn rate(&self) -> f64 {
        self.verifications as f64 / self.elapsed.as_secs_f64().max(f64::EPSILON)
    }

    /// Estimates an exhaustive search of `candidates` on `workers` threads.
    pub fn estimate(&self, candidates: u64, workers: usize) -> CrackEstimate {
        CrackEstimate::new(candidates, self.rate() * workers as f64)
    }
}

/// A target no benchmark candidate matches.
fn sample_target(algorithm: Algorithm, work_factor: Option<u32>) -> AuditResult<HashTarget> {
    let digest = match algorithm {
        Algorithm::Digest(hash_type) => "00".repeat(hash_type.digest_size()),
        Algorithm::Bcrypt => {
            let cost = work_factor.unwrap_or(DEFAULT_BENCHMARK_BCRYPT_COST);
            if !BCRYPT_COSTS.contains(&cost) {
                return Err(AuditError::Config(format!(
                    "the bcrypt cost should be in {BCRYPT_COSTS:?}, got {cost}"
                )));
            }

            bcrypt::hash("hashaudit", cost)
                .map_err(|err| AuditError::Verification(err.to_string()))?
        }
        Algorithm::Pbkdf2 => {
            let iterations = work_factor.unwrap_or(DEFAULT_BENCHMARK_PBKDF2_ITERATIONS);
            format!("pbkdf2:sha256:{iterations}:hashaudit:{}", "00".repeat(32))
        }
    };

    HashTarget::new(algorithm, &digest)
}
