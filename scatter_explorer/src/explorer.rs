use std::{
    fmt,
    sync::{Arc, Mutex},
    thread,
};

use scatter_inputs::InputTrack;
use scatter_resource::Resource;
use tracing::info;

use crate::{
    block::Block, config::Configuration, coordination::Coordination, policy::Policy, shared::Shared,
    worker::run_worker,
};

/// Everything the explorer learned, handed back once every worker thread has finished
/// its shot budget and one last merge has folded their final local pools in.
#[derive(Debug)]
pub struct ExplorerResult<const N: usize> {
    /// Every block in the shared pool at the end of the run, deduplicated by bin.
    pub blocks: Vec<Block<N>>,
}

impl<const N: usize> ExplorerResult<N> {
    /// The single highest-fitness block found, if any shots ran at all.
    pub fn best(&self) -> Option<&Block<N>> {
        self.blocks
            .iter()
            .max_by(|a, b| a.fitness.partial_cmp(&b.fitness).unwrap_or(std::cmp::Ordering::Equal))
    }
}

/// Error constructing or running the explorer.
#[derive(Debug)]
pub enum ExplorerError<E> {
    /// `config.resource_paths` didn't have exactly `config.total_threads` entries.
    ResourcePathCountMismatch { expected: usize, actual: usize },
    /// A worker thread's `Resource` failed (slot exhaustion, load failure; §7).
    Resource(E),
}

impl<E: fmt::Display> fmt::Display for ExplorerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExplorerError::ResourcePathCountMismatch { expected, actual } => write!(
                f,
                "configuration has {actual} resource paths but total_threads is {expected}"
            ),
            ExplorerError::Resource(e) => write!(f, "{e}"),
        }
    }
}

impl<E: fmt::Display + fmt::Debug> std::error::Error for ExplorerError<E> {}

/// Run the scattershot search to completion (§4.5, §5).
///
/// `make_resource` builds one [`Resource`] per worker thread from its entry in
/// `config.resource_paths`; the CLI's instantiation passes
/// `scatter_dll_resource::DllResource::load`.
pub fn run<R, P, const N: usize, F>(
    config: &Configuration,
    policy: Arc<P>,
    base_track: InputTrack,
    make_resource: F,
) -> Result<ExplorerResult<N>, ExplorerError<R::Error>>
where
    R: Resource,
    R::Error: Send,
    P: Policy<R, N>,
    F: Fn(&str) -> Result<R, R::Error> + Sync,
{
    if config.resource_paths.len() != config.total_threads {
        return Err(ExplorerError::ResourcePathCountMismatch {
            expected: config.total_threads,
            actual: config.resource_paths.len(),
        });
    }

    let shared: Arc<Mutex<Shared<N>>> = Arc::new(Mutex::new(Shared::new(
        config.max_shared_blocks,
        config.max_shared_hashes,
    )));
    // No separate coordinator thread participates, so the merge gates are sized to
    // exactly the thread count. `Coordination::cancel` (called by any worker that
    // hits a fatal `Resource` error below) wakes every peer blocked at a gate
    // instead of leaving them waiting on an arrival that will never come (§7).
    let coordination = Coordination::new(config.total_threads);

    info!(threads = config.total_threads, max_shots = config.max_shots, "starting scattershot run");

    let local_pools: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = config
            .resource_paths
            .iter()
            .enumerate()
            .map(|(thread_id, path)| {
                let policy = Arc::clone(&policy);
                let shared = Arc::clone(&shared);
                let make_resource = &make_resource;
                let base_track = base_track.clone();
                let coordination = &coordination;
                scope.spawn(move || {
                    let resource = make_resource(path).map_err(ExplorerError::Resource).map_err(|e| {
                        coordination.cancel();
                        e
                    })?;
                    run_worker(thread_id, resource, base_track, config, &*policy, &shared, coordination)
                        .map_err(ExplorerError::Resource)
                        .map_err(|e| {
                            coordination.cancel();
                            e
                        })
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("scattershot worker thread panicked"))
            .collect::<Vec<_>>()
    });

    let mut guard = shared.lock().expect("scattershot shared pool poisoned");
    for pool in local_pools {
        let pool = pool?;
        for block in pool.blocks() {
            guard
                .pool
                .upsert(block.bin, block.fitness, Arc::clone(&block.tail_segment), policy.filler_bytes());
        }
    }

    info!(blocks = guard.pool.len(), "scattershot run complete");
    Ok(ExplorerResult {
        blocks: guard.pool.blocks().to_vec(),
    })
}

/// Evenly divide `max_shots` across `total_threads`, used by tests that want to reason
/// about the per-thread shot budget without reaching into [`Configuration`] directly.
pub fn shots_per_thread(config: &Configuration) -> u64 {
    config.max_shots / config.total_threads.max(1) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shots_per_thread_divides_evenly() {
        let mut config = Configuration::default();
        config.max_shots = 100;
        config.total_threads = 4;
        assert_eq!(shots_per_thread(&config), 25);
    }

    #[test]
    fn best_picks_highest_fitness() {
        let segment = crate::segment::Segment::new(None, 0, 1);
        let result = ExplorerResult::<1> {
            blocks: vec![
                Block::new([0], 1.0, Arc::clone(&segment)),
                Block::new([1], 5.0, Arc::clone(&segment)),
                Block::new([2], 3.0, segment),
            ],
        };
        assert_eq!(result.best().unwrap().fitness, 5.0);
    }
}
