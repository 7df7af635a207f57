use std::sync::Arc;

use crate::{pool::Pool, segment::Segment};

/// The explorer's single shared pool and segment arena (§4.5 "Memory layout"),
/// guarded by one mutex. Worker threads touch this only briefly: to sample a parent
/// block at the top of a shot, and to fold their local pool in at a merge boundary.
/// Segment GC, which also needs `&Shared`, runs under the same lock by the elected
/// merge leader.
pub struct Shared<const N: usize> {
    /// Blocks every worker thread has contributed, deduplicated by bin.
    pub pool: Pool<N>,
    /// Every segment reachable from `pool`'s blocks (plus, between GC passes, some
    /// that no longer are).
    pub segments: Vec<Arc<Segment>>,
}

impl<const N: usize> Shared<N> {
    /// An empty shared pool sized per [`crate::config::Configuration`].
    pub fn new(max_shared_blocks: usize, max_shared_hashes: usize) -> Self {
        Self {
            pool: Pool::new(max_shared_blocks, max_shared_hashes),
            segments: Vec::new(),
        }
    }
}
