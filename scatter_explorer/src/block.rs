use std::sync::Arc;

use crate::{policy::Bin, segment::Segment};

/// A representative `(bin, fitness, tail_segment)` record in a pool (§3).
///
/// Blocks in the shared pool are immutable except that a bin collision with strictly
/// higher fitness replaces the block in place (§3 Lifecycle invariants) — modeled here
/// by just overwriting the `Block` value at an index, since `Block` is plain data.
#[derive(Debug, Clone)]
pub struct Block<const N: usize> {
    /// The equivalence class this block represents.
    pub bin: Bin<N>,
    /// The fitness score of the state that produced this block.
    pub fitness: f64,
    /// The last segment of the trajectory that produced this block; walking its
    /// `parent` chain back to the root reconstructs the full input sequence.
    pub tail_segment: Arc<Segment>,
}

impl<const N: usize> Block<N> {
    /// A block for a freshly observed `(bin, fitness)` pair at the end of
    /// `tail_segment`.
    pub fn new(bin: Bin<N>, fitness: f64, tail_segment: Arc<Segment>) -> Self {
        Self {
            bin,
            fitness,
            tail_segment,
        }
    }
}
