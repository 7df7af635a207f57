use std::sync::{atomic::AtomicU32, Arc};

/// One unit of input generation, linked into a lineage via `parent` (§3).
///
/// Replaying from the initial save and walking `parent` links in reverse (root first)
/// yields the full input trajectory a block represents. Segments are shared across
/// blocks with a common prefix, which is why they're reference-counted rather than
/// owned outright by the block that created them.
///
/// Unlike the reference implementation's raw `Segment*` parent pointer plus a manually
/// maintained `nReferences` count, parent links here are [`Arc`] — an `Arc<Segment>`
/// with zero remaining clones frees itself the ordinary way. `n_references` is kept
/// anyway (as an explicit, independently-zeroable counter) because the segment GC pass
/// (§4.5) is specified as a batch mark-and-sweep over the shared arena, and the
/// testable invariants (§8 invariant 4, S6) are phrased in terms of that counter, not
/// `Arc::strong_count`.
#[derive(Debug)]
pub struct Segment {
    /// The segment this one continues from, or `None` for a segment rooted at the
    /// initial save.
    pub parent: Option<Arc<Segment>>,
    /// Seed for the per-frame mutation RNG used while this segment was generated.
    pub rng_seed: u64,
    /// Number of frames this segment covers.
    pub length: u16,
    /// Recomputed from scratch by each GC pass (§4.5); not meaningful between passes.
    pub n_references: AtomicU32,
}

impl Segment {
    /// A fresh segment continuing from `parent` (or rooted, if `None`).
    pub fn new(parent: Option<Arc<Segment>>, rng_seed: u64, length: u16) -> Arc<Segment> {
        Arc::new(Segment {
            parent,
            rng_seed,
            length,
            n_references: AtomicU32::new(0),
        })
    }

    /// The chain of segments from the root to this one, root first — the order
    /// replay must walk them in to reconstruct the trajectory.
    pub fn chain_from_root(self: &Arc<Segment>) -> Vec<Arc<Segment>> {
        let mut reversed = Vec::new();
        let mut current = Some(Arc::clone(self));
        while let Some(segment) = current {
            current = segment.parent.clone();
            reversed.push(segment);
        }
        reversed.reverse();
        reversed
    }

    /// Total frame count of the chain ending at this segment.
    pub fn chain_length(self: &Arc<Segment>) -> u64 {
        let mut total = self.length as u64;
        let mut current = self.parent.clone();
        while let Some(segment) = current {
            total += segment.length as u64;
            current = segment.parent.clone();
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_from_root_orders_root_first() {
        let root = Segment::new(None, 1, 10);
        let mid = Segment::new(Some(Arc::clone(&root)), 2, 5);
        let tip = Segment::new(Some(Arc::clone(&mid)), 3, 7);

        let chain = tip.chain_from_root();
        let seeds: Vec<u64> = chain.iter().map(|s| s.rng_seed).collect();
        assert_eq!(seeds, vec![1, 2, 3]);
    }

    #[test]
    fn chain_length_sums_every_ancestor() {
        let root = Segment::new(None, 1, 10);
        let tip = Segment::new(Some(Arc::clone(&root)), 2, 7);
        assert_eq!(tip.chain_length(), 17);
    }
}
