use std::sync::Arc;

use rand::Rng;

use crate::{
    block::Block,
    hash::{hash_bin, rehash_sequence, HashTable, MAX_PROBES},
    policy::Bin,
    segment::Segment,
};

/// A fixed-capacity arena of [`Block`]s plus the [`HashTable`] indexing them by bin
/// (§4.5 "Memory layout"). Used both per-thread (one per worker) and for the single
/// shared pool the merge barrier writes into.
///
/// The reference implementation carves all threads' and the shared region's blocks out
/// of one `calloc`'d array (`AllBlocks`) with fixed per-thread strides; here each pool
/// — thread-local or shared — just owns its own `Vec`, since Rust's allocator doesn't
/// need the single-arena trick C++ uses to keep everything in one `mmap`.
#[derive(Debug)]
pub struct Pool<const N: usize> {
    blocks: Vec<Block<N>>,
    table: HashTable,
    max_blocks: usize,
}

/// Outcome of [`Pool::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No block with this bin existed; it was appended.
    Inserted,
    /// A block with this bin existed and had lower fitness; it was replaced in place.
    Replaced,
    /// A block with this bin existed with fitness `>=` the candidate's; nothing changed.
    KeptExisting,
}

impl<const N: usize> Pool<N> {
    /// An empty pool sized for `max_blocks` blocks and a hash table of `max_hashes`
    /// slots (conventionally `>= 10 * max_blocks`, per §6).
    pub fn new(max_blocks: usize, max_hashes: usize) -> Self {
        Self {
            blocks: Vec::with_capacity(max_blocks),
            table: HashTable::new(max_hashes),
            max_blocks,
        }
    }

    /// Number of blocks currently stored.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// True if no blocks are stored.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Read-only access to the stored blocks.
    pub fn blocks(&self) -> &[Block<N>] {
        &self.blocks
    }

    /// Empty the pool: clear the hash table and drop every block.
    pub fn clear(&mut self) {
        self.table.clear();
        self.blocks.clear();
    }

    /// Insert `(bin, fitness, tail_segment)`, or update the existing block with that
    /// bin if the candidate's fitness is strictly higher (§3 Lifecycle invariants,
    /// §4.5 worker loop step 4 / merge barrier).
    ///
    /// # Panics
    ///
    /// Panics if the pool is at `max_blocks` capacity and the candidate's bin isn't
    /// already present, or if no free hash slot can be found within 100 probes. Both
    /// are the "Merge-phase overflow" fatal condition from §7: a correctly sized
    /// configuration (`max_hashes >= 10 * max_blocks`) should never hit either in
    /// practice.
    pub fn upsert(
        &mut self,
        bin: Bin<N>,
        fitness: f64,
        tail_segment: Arc<Segment>,
        filler_bytes: &[usize],
    ) -> UpsertOutcome {
        let hash = hash_bin(&bin, filler_bytes);
        let capacity = self.table.capacity() as u64;

        for h in rehash_sequence(hash).take(MAX_PROBES) {
            let index = (h % capacity) as usize;
            let stored = self.table.get(index);

            if stored == -1 {
                assert!(
                    self.blocks.len() < self.max_blocks,
                    "scattershot pool overflow: more blocks than max_blocks"
                );
                let block_index = self.blocks.len();
                self.blocks.push(Block::new(bin, fitness, tail_segment));
                self.table.set(index, block_index as i32);
                return UpsertOutcome::Inserted;
            }

            let existing = &self.blocks[stored as usize];
            if existing.bin == bin {
                return if fitness > existing.fitness {
                    self.blocks[stored as usize] = Block::new(bin, fitness, tail_segment);
                    UpsertOutcome::Replaced
                } else {
                    UpsertOutcome::KeptExisting
                };
            }
        }

        panic!("scattershot hash table overflow: no free slot found in 100 probes");
    }

    /// Sample a uniformly random block's tail segment, or `None` if the pool is empty
    /// (§4.5 worker loop step 1, the "sample a random block from the shared pool"
    /// branch).
    pub fn sample(&self, rng: &mut impl Rng) -> Option<Arc<Segment>> {
        if self.blocks.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..self.blocks.len());
        Some(Arc::clone(&self.blocks[index].tail_segment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tail() -> Arc<Segment> {
        Segment::new(None, 0, 1)
    }

    #[test]
    fn first_insert_of_a_bin_is_inserted() {
        let mut pool: Pool<4> = Pool::new(16, 160);
        let outcome = pool.upsert([1, 2, 3, 4], 1.0, tail(), &[]);
        assert_eq!(outcome, UpsertOutcome::Inserted);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn higher_fitness_replaces_in_place() {
        let mut pool: Pool<4> = Pool::new(16, 160);
        pool.upsert([1, 2, 3, 4], 1.0, tail(), &[]);
        let outcome = pool.upsert([1, 2, 3, 4], 2.0, tail(), &[]);
        assert_eq!(outcome, UpsertOutcome::Replaced);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.blocks()[0].fitness, 2.0);
    }

    #[test]
    fn lower_or_equal_fitness_keeps_existing() {
        let mut pool: Pool<4> = Pool::new(16, 160);
        pool.upsert([1, 2, 3, 4], 2.0, tail(), &[]);
        let outcome = pool.upsert([1, 2, 3, 4], 2.0, tail(), &[]);
        assert_eq!(outcome, UpsertOutcome::KeptExisting);
        assert_eq!(pool.blocks()[0].fitness, 2.0);

        let outcome = pool.upsert([1, 2, 3, 4], 1.0, tail(), &[]);
        assert_eq!(outcome, UpsertOutcome::KeptExisting);
        assert_eq!(pool.blocks()[0].fitness, 2.0);
    }

    #[test]
    fn distinct_bins_both_survive() {
        let mut pool: Pool<4> = Pool::new(16, 160);
        pool.upsert([1, 2, 3, 4], 1.0, tail(), &[]);
        pool.upsert([5, 6, 7, 8], 1.0, tail(), &[]);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    #[should_panic(expected = "overflow")]
    fn exceeding_max_blocks_panics() {
        let mut pool: Pool<4> = Pool::new(1, 160);
        pool.upsert([1, 2, 3, 4], 1.0, tail(), &[]);
        pool.upsert([5, 6, 7, 8], 1.0, tail(), &[]);
    }
}
