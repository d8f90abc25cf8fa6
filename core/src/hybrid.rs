//! Combinations of dictionary words and mask candidates.

use core::{
    fmt::{self, Display},
    str::FromStr,
};
use std::{
    iter,
    ops::{ControlFlow, Range},
    sync::Arc,
};

use hashaudit_commons::MaskSpace;
use serde::{Deserialize, Serialize};

use crate::{
    dictionary::{DictionaryStreamer, WordlistSource},
    error::{AuditError, AuditResult},
    generator::{line_chunks, Chunk, Chunks, DictionaryGenerator, Generator, MaskGenerator, Visitor},
    rules::RuleEngine,
    scheduling::{ChunkIterator, ChunkLayout},
};

/// How words and mask candidates are combined.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HybridMode {
    /// The mask candidate is appended and/or prepended to every word.
    DictionaryMask,
    /// The mask candidate is inserted into every word.
    MaskDictionary,
    /// The dictionary with every rule, then the mask alone.
    RulesBrute,
}

impl HybridMode {
    pub const ALL: [HybridMode; 3] = [
        HybridMode::DictionaryMask,
        HybridMode::MaskDictionary,
        HybridMode::RulesBrute,
    ];
}

impl FromStr for HybridMode {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "dictionary_mask" => Ok(HybridMode::DictionaryMask),
            "mask_dictionary" => Ok(HybridMode::MaskDictionary),
            "rules_brute" => Ok(HybridMode::RulesBrute),
            _ => Err(AuditError::Config(format!("unknown hybrid mode {s}"))),
        }
    }
}

impl Display for HybridMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HybridMode::DictionaryMask => "dictionary_mask",
            HybridMode::MaskDictionary => "mask_dictionary",
            HybridMode::RulesBrute => "rules_brute",
        })
    }
}

/// The sides a mask candidate is attached to in [`HybridMode::DictionaryMask`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HybridOrder {
    /// `word + candidate` for every candidate, then `candidate + word`.
    #[default]
    Both,
    Append,
    Prepend,
}

/// Where a mask candidate is inserted in [`HybridMode::MaskDictionary`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertionPoint {
    Prefix,
    Suffix,
    /// After the first `len / 2` characters of the word.
    /// Skipped for words shorter than two characters.
    Midpoint,
}

impl InsertionPoint {
    /// The default insertion points.
    pub const DEFAULT: [InsertionPoint; 3] = [
        InsertionPoint::Prefix,
        InsertionPoint::Suffix,
        InsertionPoint::Midpoint,
    ];

    fn applies_to(&self, word_len: usize) -> bool {
        *self != InsertionPoint::Midpoint || word_len >= 2
    }
}

/// Options of the hybrid attacks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HybridOptions {
    pub order: HybridOrder,
    pub insertion_points: Vec<InsertionPoint>,
    /// The rules of the first phase of [`HybridMode::RulesBrute`].
    pub rules: RuleEngine,
}

impl Default for HybridOptions {
    fn default() -> Self {
        Self {
            order: HybridOrder::default(),
            insertion_points: InsertionPoint::DEFAULT.to_vec(),
            rules: RuleEngine::default(),
        }
    }
}

/// Builds the generator phases of a hybrid attack.
#[derive(Debug)]
pub struct HybridCombiner {
    mode: HybridMode,
    source: Arc<dyn WordlistSource>,
    space: MaskSpace,
    options: HybridOptions,
}

impl HybridCombiner {
    pub fn new(
        mode: HybridMode,
        source: Arc<dyn WordlistSource>,
        space: MaskSpace,
        options: HybridOptions,
    ) -> AuditResult<Self> {
        if mode == HybridMode::MaskDictionary && options.insertion_points.is_empty() {
            return Err(AuditError::Config(
                "at least one insertion point is required".to_owned(),
            ));
        }

        Ok(Self {
            mode,
            source,
            space,
            options,
        })
    }

    /// Returns the generators to run one after the other.
    /// Only [`HybridMode::RulesBrute`] has more than one phase.
    pub fn into_phases(self) -> Vec<Box<dyn Generator>> {
        let combination = match self.mode {
            HybridMode::DictionaryMask => Combination::Attach(self.options.order),
            HybridMode::MaskDictionary => Combination::Insert(self.options.insertion_points),
            HybridMode::RulesBrute => {
                let dictionary: Box<dyn Generator> = Box::new(DictionaryGenerator::new(
                    self.source,
                    Some(self.options.rules),
                ));
                let mask: Box<dyn Generator> = Box::new(MaskGenerator::new(self.space));

                return vec![dictionary, mask];
            }
        };

        let hybrid: Box<dyn Generator> = Box::new(HybridGenerator {
            source: self.source,
            space: self.space,
            combination,
        });
        vec![hybrid]
    }
}

#[derive(Clone, Debug)]
enum Combination {
    Attach(HybridOrder),
    Insert(Vec<InsertionPoint>),
}

/// Combines every word of a chunk with every candidate of a mask.
///
/// The candidates of a word are numbered by position. In [`Combination::Attach`]
/// every candidate of the mask is attached to one side, then to the other.
/// In [`Combination::Insert`] each candidate of the mask is inserted at every
/// insertion point before moving to the next one.
#[derive(Debug)]
struct HybridGenerator {
    source: Arc<dyn WordlistSource>,
    space: MaskSpace,
    combination: Combination,
}

impl HybridGenerator {
    /// The insertion points used for a word of `word_len` characters, in order.
    fn points(&self, word_len: usize) -> Vec<InsertionPoint> {
        match &self.combination {
            Combination::Attach(HybridOrder::Both) => {
                vec![InsertionPoint::Suffix, InsertionPoint::Prefix]
            }
            Combination::Attach(HybridOrder::Append) => vec![InsertionPoint::Suffix],
            Combination::Attach(HybridOrder::Prepend) => vec![InsertionPoint::Prefix],
            Combination::Insert(points) => points
                .iter()
                .copied()
                .filter(|point| point.applies_to(word_len))
                .collect(),
        }
    }

    /// The number of candidates produced for a word of `word_len` characters.
    fn word_fanout(&self, word_len: usize) -> u64 {
        (self.points(word_len).len() as u64).saturating_mul(self.space.len())
    }

    /// Visits the candidates of `word` at the given positions.
    fn expand_word(
        &self,
        word: &str,
        positions: Range<u64>,
        visit: &mut Visitor<'_>,
    ) -> ControlFlow<()> {
        let points = self.points(word.chars().count());
        let sides = points.len() as u64;
        let mut bytes = Vec::new();
        let mut candidate = String::new();

        for position in positions {
            let (point, index) = match self.combination {
                Combination::Attach(_) => (
                    points[(position / self.space.len()) as usize],
                    position % self.space.len(),
                ),
                Combination::Insert(_) => (points[(position % sides) as usize], position / sides),
            };

            self.space.write_candidate(index, &mut bytes);
            splice(word, &bytes, point, &mut candidate);
            visit(&candidate)?;
        }

        ControlFlow::Continue(())
    }

    /// Cuts the candidates of every word into chunks of positions,
    /// for words producing more candidates than a chunk holds.
    fn word_chunks(&self, layout: ChunkLayout) -> AuditResult<Chunks<'_>> {
        let mut streamer = DictionaryStreamer::new(self.source.as_ref())?;
        let batches = iter::from_fn(move || streamer.next_batch(1).transpose());

        Ok(Box::new(batches.flat_map(move |batch| {
            let (lines, words) = match batch {
                Ok(batch) => batch,
                Err(err) => {
                    let failed: Chunks<'_> = Box::new(iter::once(Err(err)));
                    return failed;
                }
            };

            let chunks: Chunks<'_> = Box::new(words.into_iter().flat_map(move |word| {
                let lines = lines.clone();
                let fanout = self.word_fanout(word.chars().count());

                ChunkIterator::new(fanout, layout).map(move |positions| {
                    Ok(Chunk::Word {
                        lines: lines.clone(),
                        word: word.clone(),
                        positions,
                    })
                })
            }));
            chunks
        })))
    }
}

/// Writes `word` with the ASCII mask candidate inserted at `point` into `out`.
fn splice(word: &str, mask_candidate: &[u8], point: InsertionPoint, out: &mut String) {
    let split = match point {
        InsertionPoint::Prefix => 0,
        InsertionPoint::Suffix => word.len(),
        InsertionPoint::Midpoint => {
            let half = word.chars().count() / 2;
            word.char_indices().nth(half).map_or(word.len(), |(i, _)| i)
        }
    };

    out.clear();
    out.push_str(&word[..split]);
    out.extend(mask_candidate.iter().copied().map(char::from));
    out.push_str(&word[split..]);
}

impl Generator for HybridGenerator {
    fn name(&self) -> &'static str {
        match self.combination {
            Combination::Attach(_) => "dictionary_mask",
            Combination::Insert(_) => "mask_dictionary",
        }
    }

    fn candidate_count(&self) -> Option<u64> {
        None
    }

    fn chunks(&self, layout: ChunkLayout) -> AuditResult<Chunks<'_>> {
        let fanout = self.word_fanout(usize::MAX);

        if fanout > layout.chunk_size {
            self.word_chunks(layout)
        } else {
            line_chunks(self.source.as_ref(), layout, fanout)
        }
    }

    fn expand(&self, chunk: &Chunk, skip: u64, visit: &mut Visitor<'_>) -> ControlFlow<()> {
        match chunk {
            Chunk::Lines { words, .. } => {
                let mut skip = skip;

                for word in words {
                    // words fully processed before a requeue are skipped without expansion
                    let fanout = self.word_fanout(word.chars().count());
                    if skip >= fanout {
                        skip -= fanout;
                        continue;
                    }

                    self.expand_word(word, skip..fanout, visit)?;
                    skip = 0;
                }

                ControlFlow::Continue(())
            }
            Chunk::Word {
                word, positions, ..
            } => {
                let start = positions.start.saturating_add(skip).min(positions.end);
                self.expand_word(word, start..positions.end, visit)
            }
            Chunk::Indices(_) => ControlFlow::Continue(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{ops::ControlFlow, sync::Arc};

    use hashaudit_commons::{Mask, MaskSpace};

    use super::{HybridCombiner, HybridMode, HybridOptions, HybridOrder, InsertionPoint};
    use crate::{
        dictionary::MemoryWordlist,
        error::AuditError,
        generator::{Chunk, Generator},
        rules::RuleEngine,
        scheduling::ChunkLayout,
    };

    const LAYOUT: ChunkLayout = ChunkLayout {
        workers: 2,
        chunk_size: 8,
    };

    fn phases(mode: HybridMode, words: &[&str], mask: &str, options: HybridOptions) -> Vec<Box<dyn Generator>> {
        let space = MaskSpace::fixed(&Mask::parse(mask).unwrap()).unwrap();
        let source = Arc::new(MemoryWordlist::new(words));

        HybridCombiner::new(mode, source, space, options)
            .unwrap()
            .into_phases()
    }

    fn collect(generator: &dyn Generator, skip: u64) -> Vec<String> {
        let mut candidates = Vec::new();

        for chunk in generator.chunks(LAYOUT).unwrap() {
            let _ = generator.expand(&chunk.unwrap(), skip, &mut |candidate| {
                candidates.push(candidate.to_owned());
                ControlFlow::Continue(())
            });
        }

        candidates
    }

    #[test]
    fn test_dictionary_mask_both() {
        let phases = phases(HybridMode::DictionaryMask, &["pw", "x"], "?b", HybridOptions::default());
        assert_eq!(1, phases.len());

        assert_eq!(
            vec!["pw0", "pw1", "0pw", "1pw", "x0", "x1", "0x", "1x"],
            collect(phases[0].as_ref(), 0)
        );
    }

    #[test]
    fn test_dictionary_mask_order() {
        let options = HybridOptions {
            order: HybridOrder::Prepend,
            ..Default::default()
        };
        let phases = phases(HybridMode::DictionaryMask, &["pw"], "?d", options);

        let candidates = collect(phases[0].as_ref(), 0);
        assert_eq!(10, candidates.len());
        assert_eq!("0pw", candidates[0]);
        assert_eq!("9pw", candidates[9]);
    }

    #[test]
    fn test_mask_dictionary() {
        let phases = phases(HybridMode::MaskDictionary, &["abcd", "z"], "?b", HybridOptions::default());

        assert_eq!(
            vec![
                "0abcd", "abcd0", "ab0cd", "1abcd", "abcd1", "ab1cd",
                // midpoint is skipped for single characters
                "0z", "z0", "1z", "z1",
            ],
            collect(phases[0].as_ref(), 0)
        );
    }

    #[test]
    fn test_midpoint_is_char_based() {
        let options = HybridOptions {
            insertion_points: vec![InsertionPoint::Midpoint],
            ..Default::default()
        };
        let phases = phases(HybridMode::MaskDictionary, &["été"], "?b", options);

        assert_eq!(vec!["é0té", "é1té"], collect(phases[0].as_ref(), 0));
    }

    #[test]
    fn test_skip_resumes_mid_word() {
        let phases = phases(HybridMode::DictionaryMask, &["pw", "x"], "?b", HybridOptions::default());

        // the whole list fits in a single chunk
        assert_eq!(vec!["1pw", "x0", "x1", "0x", "1x"], collect(phases[0].as_ref(), 3));
    }

    #[test]
    fn test_large_word_spans_chunks() {
        for mode in [HybridMode::DictionaryMask, HybridMode::MaskDictionary] {
            let phases = phases(mode, &["admin", "", "ab"], "?l?l", HybridOptions::default());
            let generator = phases[0].as_ref();

            let layout = ChunkLayout {
                workers: 4,
                chunk_size: 100,
            };
            let chunks = generator
                .chunks(layout)
                .unwrap()
                .map(Result::unwrap)
                .collect::<Vec<_>>();

            // 2 or 3 candidates per mask candidate, 676 mask candidates per word
            assert!(chunks.len() >= 2 * 4);
            let mut candidates = Vec::new();
            for chunk in &chunks {
                let Chunk::Word { positions, .. } = chunk else {
                    panic!("expected a chunk of a single word, got {chunk:?}");
                };
                assert!(positions.end - positions.start <= 100);

                let _ = generator.expand(chunk, 0, &mut |candidate| {
                    candidates.push(candidate.to_owned());
                    ControlFlow::Continue(())
                });
            }

            // same candidates, in the same order, as whole lines
            let lines = ChunkLayout {
                workers: 1,
                chunk_size: u64::MAX,
            };
            let mut expected = Vec::new();
            for chunk in generator.chunks(lines).unwrap() {
                let _ = generator.expand(&chunk.unwrap(), 0, &mut |candidate| {
                    expected.push(candidate.to_owned());
                    ControlFlow::Continue(())
                });
            }
            assert_eq!(expected, candidates);
        }
    }

    #[test]
    fn test_word_chunk_skip() {
        let phases = phases(HybridMode::MaskDictionary, &["abcd"], "?b", HybridOptions::default());
        let chunk = Chunk::Word {
            lines: 0..1,
            word: "abcd".to_owned(),
            positions: 2..5,
        };

        let mut seen = Vec::new();
        let _ = phases[0].expand(&chunk, 1, &mut |candidate| {
            seen.push(candidate.to_owned());
            ControlFlow::Continue(())
        });

        assert_eq!(vec!["1abcd", "abcd1"], seen);
    }

    #[test]
    fn test_rules_brute_phases() {
        let options = HybridOptions {
            rules: RuleEngine::from_names(&["identity", "uppercase"]).unwrap(),
            ..Default::default()
        };
        let phases = phases(HybridMode::RulesBrute, &["ab"], "?b?b", options);

        assert_eq!(2, phases.len());
        assert_eq!(vec!["ab", "AB"], collect(phases[0].as_ref(), 0));
        assert_eq!(vec!["00", "01", "10", "11"], collect(phases[1].as_ref(), 0));
        assert_eq!(Some(4), phases[1].candidate_count());
    }

    #[test]
    fn test_no_insertion_point() {
        let space = MaskSpace::fixed(&Mask::parse("?d").unwrap()).unwrap();
        let options = HybridOptions {
            insertion_points: Vec::new(),
            ..Default::default()
        };

        assert!(matches!(
            HybridCombiner::new(
                HybridMode::MaskDictionary,
                Arc::new(MemoryWordlist::new(["a"])),
                space,
                options
            ),
            Err(AuditError::Config(_))
        ));
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!(HybridMode::RulesBrute, "rules-brute".parse().unwrap());
        assert_eq!(HybridMode::DictionaryMask, "dictionary_mask".parse().unwrap());
        assert!("interleaved".parse::<HybridMode>().is_err());

        for mode in HybridMode::ALL {
            assert_eq!(mode, mode.to_string().parse().unwrap());
        }
    }
}
