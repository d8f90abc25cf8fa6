use std::{sync::Arc, thread, time::Duration};

use hashaudit_commons::{Mask, MaskError, MaskSpace};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    dictionary::WordlistSource,
    error::{AuditError, AuditResult},
    generator::{DictionaryGenerator, Generator, MaskGenerator},
    hybrid::{HybridCombiner, HybridMode, HybridOptions},
    rules::RuleEngine,
    scheduling::ChunkLayout,
    DEFAULT_CHUNK_SIZE, DEFAULT_MAX_SPACE, DEFAULT_PROGRESS_INTERVAL,
};

/// A builder for an engine configuration.
#[derive(Clone, Debug)]
pub struct EngineConfigBuilder {
    workers: Option<usize>,
    timeout: Option<Duration>,
    chunk_size: u64,
    progress_interval: Duration,
    max_space: u64,
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self {
            workers: None,
            timeout: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            max_space: DEFAULT_MAX_SPACE,
        }
    }
}

impl EngineConfigBuilder {
    /// Creates a new EngineConfigBuilder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of workers.
    /// Defaults to the available parallelism.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);

        self
    }

    /// Sets the wall-clock limit of a run.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;

        self
    }

    /// Sets the maximum number of candidates in a chunk.
    /// Smaller chunks balance the load better at the cost of more coordination.
    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;

        self
    }

    /// Sets the interval between two progress events.
    pub fn progress_interval(mut self, progress_interval: Duration) -> Self {
        self.progress_interval = progress_interval;

        self
    }

    /// Sets the maximum size of a mask space.
    pub fn max_space(mut self, max_space: u64) -> Self {
        self.max_space = max_space;

        self
    }

    /// Builds an EngineConfig with the specified parameters.
    pub fn build(self) -> AuditResult<EngineConfig> {
        let workers = match self.workers {
            Some(workers) => workers,
            None => thread::available_parallelism()?.get(),
        };

        if workers == 0 {
            return Err(AuditError::Config(
                "at least one worker is required".to_owned(),
            ));
        }

        if self.chunk_size == 0 {
            return Err(AuditError::Config(
                "the chunk size should be positive".to_owned(),
            ));
        }

        if self.progress_interval.is_zero() {
            return Err(AuditError::Config(
                "the progress interval should be positive".to_owned(),
            ));
        }

        if self.max_space == 0 {
            return Err(AuditError::Config(
                "the maximum space should be positive".to_owned(),
            ));
        }

        Ok(EngineConfig {
            workers,
            timeout: self.timeout,
            chunk_size: self.chunk_size,
            progress_interval: self.progress_interval,
            max_space: self.max_space,
        })
    }
}

/// The parameters of the engine, fixed for a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// The number of worker threads.
    pub workers: usize,
    /// The wall-clock limit of a run.
    pub timeout: Option<Duration>,
    /// The maximum number of candidates in a chunk.
    pub chunk_size: u64,
    /// The interval between two progress events.
    pub progress_interval: Duration,
    /// The maximum size of a mask space.
    pub max_space: u64,
}

impl EngineConfig {
    pub(crate) fn layout(&self) -> ChunkLayout {
        ChunkLayout {
            workers: self.workers,
            chunk_size: self.chunk_size,
        }
    }

    /// Builds a mask space and makes sure it is under the configured ceiling.
    pub fn mask_space(&self, pattern: &Mask, min_length: usize, max_length: usize) -> AuditResult<MaskSpace> {
        let space = MaskSpace::new(pattern, min_length, max_length).map_err(|err| match err {
            MaskError::Space(bits) => AuditError::Space { bits, limit: 64 },
            err => AuditError::Mask(err),
        })?;

        if space.len() > self.max_space {
            return Err(AuditError::Space {
                bits: bits(space.len()),
                limit: bits(self.max_space),
            });
        }

        debug!(
            "Mask {pattern} of lengths {min_length}..={max_length} holds {} candidates",
            space.len()
        );
        Ok(space)
    }
}

/// Number of bits needed to represent `n`.
fn bits(n: u64) -> u32 {
    64 - n.leading_zeros()
}

/// An attack strategy.
#[derive(Clone, Debug)]
pub enum AttackConfig {
    /// Words of a wordlist, with or without mutation rules.
    Dictionary {
        source: Arc<dyn WordlistSource>,
        rules: Option<RuleEngine>,
    },
    /// Every candidate of a mask.
    /// Lengths default to the length of the pattern.
    Mask {
        pattern: String,
        min_length: Option<usize>,
        max_length: Option<usize>,
    },
    /// Words combined with mask candidates.
    Hybrid {
        mode: HybridMode,
        source: Arc<dyn WordlistSource>,
        pattern: String,
        options: HybridOptions,
    },
}

impl AttackConfig {
    /// Validates the attack and returns the generators to run one after the other.
    pub fn phases(&self, config: &EngineConfig) -> AuditResult<Vec<Box<dyn Generator>>> {
        match self {
            AttackConfig::Dictionary { source, rules } => {
                source.validate()?;

                let generator: Box<dyn Generator> =
                    Box::new(DictionaryGenerator::new(source.clone(), rules.clone()));
                Ok(vec![generator])
            }

            AttackConfig::Mask {
                pattern,
                min_length,
                max_length,
            } => {
                let mask = Mask::parse(pattern)?;
                let min_length = min_length.unwrap_or(mask.len());
                let max_length = max_length.unwrap_or(mask.len());
                let space = config.mask_space(&mask, min_length, max_length)?;

                let generator: Box<dyn Generator> = Box::new(MaskGenerator::new(space));
                Ok(vec![generator])
            }

            AttackConfig::Hybrid {
                mode,
                source,
                pattern,
                options,
            } => {
                let mask = Mask::parse(pattern)?;
                let space = config.mask_space(&mask, mask.len(), mask.len())?;
                source.validate()?;

                let combiner = HybridCombiner::new(*mode, source.clone(), space, options.clone())?;
                Ok(combiner.into_phases())
            }
        }
    }

    /// The number of candidates over every phase.
    /// `None` when a phase streams a wordlist or when the sum overflows.
    pub fn candidate_count(&self, config: &EngineConfig) -> AuditResult<Option<u64>> {
        let phases = self.phases(config)?;

        Ok(phases
            .iter()
            .try_fold(0u64, |total, phase| total.checked_add(phase.candidate_count()?)))
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::{AttackConfig, EngineConfigBuilder};
    use crate::{
        dictionary::MemoryWordlist,
        error::AuditError,
        hybrid::{HybridMode, HybridOptions},
        DEFAULT_CHUNK_SIZE, DEFAULT_PROGRESS_INTERVAL,
    };

    #[test]
    fn test_defaults() {
        let config = EngineConfigBuilder::new().build().unwrap();

        assert!(config.workers >= 1);
        assert_eq!(None, config.timeout);
        assert_eq!(DEFAULT_CHUNK_SIZE, config.chunk_size);
        assert_eq!(DEFAULT_PROGRESS_INTERVAL, config.progress_interval);
        assert_eq!(u64::MAX, config.max_space);
    }

    #[test]
    fn test_invalid_config() {
        for builder in [
            EngineConfigBuilder::new().workers(0),
            EngineConfigBuilder::new().chunk_size(0),
            EngineConfigBuilder::new().progress_interval(Duration::ZERO),
            EngineConfigBuilder::new().max_space(0),
        ] {
            assert!(matches!(builder.build(), Err(AuditError::Config(_))));
        }
    }

    #[test]
    fn test_mask_phases() {
        let config = EngineConfigBuilder::new().workers(2).build().unwrap();
        let attack = AttackConfig::Mask {
            pattern: "?l?d".to_owned(),
            min_length: Some(1),
            max_length: None,
        };

        let phases = attack.phases(&config).unwrap();
        assert_eq!(1, phases.len());
        assert_eq!(Some(26 + 260), phases[0].candidate_count());
    }

    #[test]
    fn test_candidate_count() {
        let config = EngineConfigBuilder::new().workers(1).build().unwrap();

        let attack = AttackConfig::Mask {
            pattern: "?d?d".to_owned(),
            min_length: Some(1),
            max_length: Some(3),
        };
        assert_eq!(Some(10 + 100 + 1_000), attack.candidate_count(&config).unwrap());

        let attack = AttackConfig::Dictionary {
            source: Arc::new(MemoryWordlist::new(["admin"])),
            rules: None,
        };
        assert_eq!(None, attack.candidate_count(&config).unwrap());

        let attack = AttackConfig::Mask {
            pattern: "?x".to_owned(),
            min_length: None,
            max_length: None,
        };
        assert!(matches!(attack.candidate_count(&config), Err(AuditError::Mask(_))));
    }

    #[test]
    fn test_space_ceiling() {
        let config = EngineConfigBuilder::new()
            .workers(1)
            .max_space(1_000)
            .build()
            .unwrap();

        let attack = AttackConfig::Mask {
            pattern: "?d?d?d?d".to_owned(),
            min_length: None,
            max_length: None,
        };
        assert!(matches!(
            attack.phases(&config),
            Err(AuditError::Space { bits: 14, limit: 10 })
        ));

        let attack = AttackConfig::Mask {
            pattern: "?a".repeat(12),
            min_length: None,
            max_length: None,
        };
        assert!(matches!(
            attack.phases(&EngineConfigBuilder::new().workers(1).build().unwrap()),
            Err(AuditError::Space { bits: 79, limit: 64 })
        ));
    }

    #[test]
    fn test_unbounded_mask_length() {
        let config = EngineConfigBuilder::new().workers(1).build().unwrap();
        let attack = AttackConfig::Mask {
            pattern: "?l".to_owned(),
            min_length: Some(1),
            max_length: Some(usize::MAX),
        };

        assert!(matches!(
            attack.phases(&config),
            Err(AuditError::Space { limit: 64, .. })
        ));
    }

    #[test]
    fn test_invalid_attacks() {
        let config = EngineConfigBuilder::new().workers(1).build().unwrap();

        let attack = AttackConfig::Mask {
            pattern: "?l?".to_owned(),
            min_length: None,
            max_length: None,
        };
        assert!(matches!(attack.phases(&config), Err(AuditError::Mask(_))));

        let attack = AttackConfig::Dictionary {
            source: Arc::new(MemoryWordlist::new([""])),
            rules: None,
        };
        assert!(matches!(attack.phases(&config), Err(AuditError::Source(_))));

        let attack = AttackConfig::Hybrid {
            mode: HybridMode::RulesBrute,
            source: Arc::new(MemoryWordlist::new(["word"])),
            pattern: "?d?d".to_owned(),
            options: HybridOptions::default(),
        };
        assert_eq!(2, attack.phases(&config).unwrap().len());
    }
}
