use std::ops::Range;

/// How a candidate space should be cut into chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkLayout {
    /// The number of workers sharing the space.
    pub workers: usize,
    /// The maximum number of candidates in a chunk.
    pub chunk_size: u64,
}

/// An iterator that splits an index space into contiguous chunks.
#[derive(Clone, Debug)]
pub struct ChunkIterator {
    range_start: u64,
    chunk_size: u64,
    remainder: u64,
    chunk_number: u64,
    chunks: u64,
}

impl ChunkIterator {
    /// Creates a new chunk iterator over `0..len`.
    pub fn new(len: u64, layout: ChunkLayout) -> ChunkIterator {
        // every worker should get a chunk, but a chunk should never exceed the chunk size
        let chunks = (layout.workers.max(1) as u64)
            .max(len.div_ceil(layout.chunk_size.max(1)))
            .min(len);

        let (chunk_size, remainder) = if chunks == 0 {
            (0, 0)
        } else {
            (len / chunks, len % chunks)
        };

        ChunkIterator {
            range_start: 0,
            chunk_size,
            remainder,
            chunk_number: 0,
            chunks,
        }
    }

    /// The number of chunks left.
    pub fn remaining(&self) -> u64 {
        self.chunks - self.chunk_number
    }
}

impl Iterator for ChunkIterator {
    type Item = Range<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.chunk_number == self.chunks {
            return None;
        }

        // spread the remainder over the first chunks
        let chunk_size = if self.chunk_number < self.remainder {
            self.chunk_size + 1
        } else {
            self.chunk_size
        };

        let range_end = self.range_start + chunk_size;
        let range = self.range_start..range_end;
        self.range_start = range_end;

        self.chunk_number += 1;
        Some(range)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining()).unwrap_or(usize::MAX);
        (remaining, usize::try_from(self.remaining()).ok())
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::{ChunkIterator, ChunkLayout};

    fn layout(workers: usize, chunk_size: u64) -> ChunkLayout {
        ChunkLayout {
            workers,
            chunk_size,
        }
    }

    #[test]
    fn test_partition_is_exact() {
        for len in [1, 2, 7, 99, 100, 101, 1_000, 45_697] {
            for workers in [1, 3, 4, 16] {
                for chunk_size in [1, 10, 64, 50_000] {
                    let chunks = ChunkIterator::new(len, layout(workers, chunk_size)).collect_vec();

                    // contiguous, no gap and no overlap
                    assert_eq!(0, chunks[0].start);
                    assert_eq!(len, chunks.last().unwrap().end);
                    for (a, b) in chunks.iter().tuple_windows() {
                        assert_eq!(a.end, b.start);
                    }

                    assert!(chunks.iter().all(|chunk| !chunk.is_empty()));
                    assert!(chunks
                        .iter()
                        .all(|chunk| chunk.end - chunk.start <= chunk_size));
                    assert!(chunks.len() as u64 >= (workers as u64).min(len));
                }
            }
        }
    }

    #[test]
    fn test_one_chunk_per_worker() {
        let chunks = ChunkIterator::new(1_000, layout(4, 50_000)).collect_vec();

        assert_eq!(vec![0..250, 250..500, 500..750, 750..1_000], chunks);
    }

    #[test]
    fn test_remainder() {
        let chunks = ChunkIterator::new(10, layout(4, 50_000)).collect_vec();

        // the first chunks should have one element more
        assert_eq!(vec![0..3, 3..6, 6..8, 8..10], chunks);
    }

    #[test]
    fn test_chunk_size_limit() {
        let iter = ChunkIterator::new(456_976, layout(4, 50_000));
        assert_eq!(10, iter.remaining());

        let chunks = iter.collect_vec();
        assert!(chunks.iter().all(|chunk| chunk.end - chunk.start <= 50_000));
    }

    #[test]
    fn test_empty_space() {
        assert_eq!(0, ChunkIterator::new(0, layout(4, 10)).count());
    }

    #[test]
    fn test_more_workers_than_candidates() {
        let chunks = ChunkIterator::new(3, layout(8, 10)).collect_vec();

        assert_eq!(vec![0..1, 1..2, 2..3], chunks);
    }
}
