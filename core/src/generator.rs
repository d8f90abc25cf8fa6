//! Candidate generators that can be cut into chunks and expanded independently.

use std::{ops::ControlFlow, ops::Range, sync::Arc};

use hashaudit_commons::MaskSpace;

use crate::{
    dictionary::{DictionaryStreamer, WordlistSource},
    error::AuditResult,
    rules::RuleEngine,
    scheduling::{ChunkIterator, ChunkLayout},
};

/// A contiguous part of a candidate space, processed by a single worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Chunk {
    /// A range of candidate indices.
    Indices(Range<u64>),
    /// A range of wordlist lines and their words.
    Lines { lines: Range<u64>, words: Vec<String> },
    /// A range of the candidates derived from a single word.
    Word {
        lines: Range<u64>,
        word: String,
        positions: Range<u64>,
    },
}

/// A boxed iterator of chunks.
pub type Chunks<'a> = Box<dyn Iterator<Item = AuditResult<Chunk>> + 'a>;

/// A candidate visitor. Returning `ControlFlow::Break` stops the expansion.
pub type Visitor<'a> = dyn FnMut(&str) -> ControlFlow<()> + 'a;

/// A deterministic source of candidates.
pub trait Generator: Send + Sync {
    /// A short name for logs and events.
    fn name(&self) -> &'static str;

    /// The number of candidates, if known without streaming the source.
    fn candidate_count(&self) -> Option<u64>;

    /// Cuts the candidate space into chunks, lazily.
    fn chunks(&self, layout: ChunkLayout) -> AuditResult<Chunks<'_>>;

    /// Visits the candidates of a chunk in order, skipping the first `skip` ones.
    fn expand(&self, chunk: &Chunk, skip: u64, visit: &mut Visitor<'_>) -> ControlFlow<()>;
}

/// Enumerates a mask space by index.
#[derive(Clone, Debug)]
pub struct MaskGenerator {
    space: MaskSpace,
}

impl MaskGenerator {
    pub fn new(space: MaskSpace) -> Self {
        Self { space }
    }

    pub fn space(&self) -> &MaskSpace {
        &self.space
    }
}

impl Generator for MaskGenerator {
    fn name(&self) -> &'static str {
        "mask"
    }

    fn candidate_count(&self) -> Option<u64> {
        Some(self.space.len())
    }

    fn chunks(&self, layout: ChunkLayout) -> AuditResult<Chunks<'_>> {
        Ok(Box::new(
            ChunkIterator::new(self.space.len(), layout).map(|range| Ok(Chunk::Indices(range))),
        ))
    }

    fn expand(&self, chunk: &Chunk, skip: u64, visit: &mut Visitor<'_>) -> ControlFlow<()> {
        let Chunk::Indices(range) = chunk else {
            return ControlFlow::Continue(());
        };

        let mut bytes = Vec::new();
        let mut candidate = String::new();

        for index in range.start.saturating_add(skip)..range.end {
            self.space.write_candidate(index, &mut bytes);
            candidate.clear();
            candidate.extend(bytes.iter().copied().map(char::from));

            visit(&candidate)?;
        }

        ControlFlow::Continue(())
    }
}

/// Cuts a wordlist into chunks of lines.
/// `fanout` is the expected number of candidates per word.
pub(crate) fn line_chunks<'a>(
    source: &'a dyn WordlistSource,
    layout: ChunkLayout,
    fanout: u64,
) -> AuditResult<Chunks<'a>> {
    let lines_per_chunk = (layout.chunk_size / fanout.max(1)).max(1);
    let mut streamer = DictionaryStreamer::new(source)?;

    Ok(Box::new(std::iter::from_fn(move || {
        streamer
            .next_batch(lines_per_chunk)
            .transpose()
            .map(|batch| batch.map(|(lines, words)| Chunk::Lines { lines, words }))
    })))
}

/// Streams a wordlist, optionally applying mutation rules.
#[derive(Debug)]
pub struct DictionaryGenerator {
    source: Arc<dyn WordlistSource>,
    rules: Option<RuleEngine>,
}

impl DictionaryGenerator {
    pub fn new(source: Arc<dyn WordlistSource>, rules: Option<RuleEngine>) -> Self {
        Self { source, rules }
    }
}

impl Generator for DictionaryGenerator {
    fn name(&self) -> &'static str {
        if self.rules.is_some() {
            "dictionary+rules"
        } else {
            "dictionary"
        }
    }

    fn candidate_count(&self) -> Option<u64> {
        None
    }

    fn chunks(&self, layout: ChunkLayout) -> AuditResult<Chunks<'_>> {
        let fanout = self.rules.as_ref().map_or(1, RuleEngine::max_variants);
        line_chunks(self.source.as_ref(), layout, fanout as u64)
    }

    fn expand(&self, chunk: &Chunk, skip: u64, visit: &mut Visitor<'_>) -> ControlFlow<()> {
        let Chunk::Lines { words, .. } = chunk else {
            return ControlFlow::Continue(());
        };

        let mut skip = skip;
        let mut variants = Vec::new();

        for word in words {
            match &self.rules {
                Some(rules) => rules.variants_into(word, &mut variants),
                None => {
                    variants.clear();
                    variants.push(word.clone());
                }
            }

            for variant in &variants {
                if skip > 0 {
                    skip -= 1;
                    continue;
                }

                visit(variant)?;
            }
        }

        ControlFlow::Continue(())
    }
}
