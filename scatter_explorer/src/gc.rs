use std::sync::atomic::Ordering;

use crate::{block::Block, segment::Segment};

/// Reference-counted segment GC (§4.5 "Segment garbage collection").
///
/// Run periodically (every `MergesPerSegmentGC` merges) under the same single-writer
/// barrier the merge itself runs under. `shared_segments` holds every segment any
/// shared block's lineage might walk through; `shared_blocks` is consulted only to
/// mark their `tail_segment`s as live.
///
/// After this runs, every segment with `n_references == 0` — reachable from no shared
/// block and no live child segment — has been dropped from `shared_segments`. Since
/// each segment's parent link is itself an `Arc`, a segment actually deallocates only
/// once every `Arc` to it (including ones briefly held on the call stack during this
/// pass) goes out of scope; dropping it from `shared_segments` removes the arena's own
/// reference.
pub fn collect_segments<const N: usize>(
    shared_segments: &mut Vec<std::sync::Arc<Segment>>,
    shared_blocks: &[Block<N>],
) {
    for segment in shared_segments.iter() {
        segment.n_references.store(0, Ordering::Relaxed);
    }

    for segment in shared_segments.iter() {
        if let Some(parent) = &segment.parent {
            parent.n_references.fetch_add(1, Ordering::Relaxed);
        }
    }

    for block in shared_blocks {
        block.tail_segment.n_references.fetch_add(1, Ordering::Relaxed);
    }

    let mut i = 0;
    while i < shared_segments.len() {
        if shared_segments[i].n_references.load(Ordering::Relaxed) == 0 {
            if let Some(parent) = &shared_segments[i].parent {
                parent.n_references.fetch_sub(1, Ordering::Relaxed);
            }
            shared_segments.swap_remove(i);
        } else {
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn unreachable_segments_are_collected_reachable_ones_survive() {
        let root = Segment::new(None, 0, 1);
        let mut chain = vec![Arc::clone(&root)];
        let mut tail = root;
        for i in 1..10u64 {
            tail = Segment::new(Some(Arc::clone(&tail)), i, 1);
            chain.push(Arc::clone(&tail));
        }
        // 990 throwaway unreachable segments, rooted independently.
        for i in 0..990u64 {
            chain.push(Segment::new(None, 1000 + i, 1));
        }
        assert_eq!(chain.len(), 1000);

        let blocks = vec![Block::new([0u8; 1], 1.0, Arc::clone(&tail))];

        collect_segments(&mut chain, &blocks);

        assert_eq!(chain.len(), 10);
        // Every survivor is an ancestor of `tail`.
        let ancestors: Vec<u64> = tail.chain_from_root().iter().map(|s| s.rng_seed).collect();
        for segment in &chain {
            assert!(ancestors.contains(&segment.rng_seed));
        }
    }

    #[test]
    fn running_gc_twice_with_no_changes_is_a_no_op() {
        let root = Segment::new(None, 0, 1);
        let tip = Segment::new(Some(Arc::clone(&root)), 1, 1);
        let mut segments = vec![Arc::clone(&root), Arc::clone(&tip)];
        let blocks = vec![Block::new([0u8; 1], 1.0, Arc::clone(&tip))];

        collect_segments(&mut segments, &blocks);
        let after_first = segments.len();
        collect_segments(&mut segments, &blocks);
        assert_eq!(segments.len(), after_first);
        assert_eq!(after_first, 2);
    }
}
