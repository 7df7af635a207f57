use std::sync::{Arc, Mutex};

use rand::{rngs::StdRng, Rng, SeedableRng};
use scatter_inputs::InputTrack;
use scatter_resource::Resource;
use scatter_script::ScriptEngine;
use tracing::{debug, info};

use crate::{
    config::Configuration,
    coordination::{Arrival, Coordination},
    gc::collect_segments,
    pool::Pool,
    policy::Policy,
    segment::Segment,
    shared::Shared,
};

/// One worker's run (§4.5 "Worker loop (per thread)").
///
/// Owns its `Resource` and `ScriptEngine` exclusively; the only cross-thread contact
/// point is `shared`, touched briefly at the top of each shot (to sample a parent) and
/// at merge boundaries (to contribute this thread's local pool and, for one elected
/// thread per merge, to run the shared GC).
pub fn run_worker<R, P, const N: usize>(
    thread_id: usize,
    resource: R,
    base_track: InputTrack,
    config: &Configuration,
    policy: &P,
    shared: &Arc<Mutex<Shared<N>>>,
    coordination: &Coordination,
) -> Result<Pool<N>, R::Error>
where
    R: Resource,
    P: Policy<R, N>,
{
    let mut engine = ScriptEngine::new(resource, base_track)?;
    engine.long_load(config.start_frame)?;
    let start_frame = engine.current_frame();

    let mut local_pool = Pool::<N>::new(config.max_blocks, config.max_hashes);
    let mut local_segments: Vec<Arc<Segment>> = Vec::new();
    let mut rng = StdRng::from_entropy();

    let shots_for_thread = config.max_shots / config.total_threads.max(1) as u64;
    let mut shots_since_merge = 0u64;
    let mut merges_done = 0u64;

    for shot in 0..shots_for_thread {
        if coordination.is_cancelled() {
            break;
        }

        let sample_root = config.start_from_root_every_n_shots <= 1
            || rng.gen_range(0..config.start_from_root_every_n_shots) == 0;

        let parent_tail = if sample_root {
            None
        } else {
            let guard = shared.lock().expect("scattershot shared pool poisoned");
            guard.pool.sample(&mut rng)
        };

        engine.rollback(start_frame)?;
        if let Some(tail) = &parent_tail {
            replay_chain(&mut engine, tail, policy)?;
        }

        let mut chain_tail = parent_tail;
        let mut chain_frames = chain_tail
            .as_ref()
            .map(Segment::chain_length)
            .unwrap_or(0);

        for _ in 0..config.segments_per_shot {
            if chain_frames + config.segment_length as u64 > config.max_lightning_length as u64 {
                break;
            }

            let seed: u64 = rng.gen();
            let mut segment_rng = StdRng::seed_from_u64(seed);
            for _ in 0..config.segment_length {
                let inputs = {
                    let resource = engine.resource().borrow();
                    policy.mutate_frame(&resource, &mut segment_rng)
                };
                engine.advance_frame_write(inputs);
            }

            let segment = Segment::new(chain_tail.clone(), seed, config.segment_length);
            local_segments.push(Arc::clone(&segment));
            chain_frames += config.segment_length as u64;

            let (bin, fitness) = {
                let resource = engine.resource().borrow();
                (policy.project(&resource), policy.fitness(&resource))
            };
            local_pool.upsert(bin, fitness, Arc::clone(&segment), policy.filler_bytes());

            chain_tail = Some(segment);
        }

        shots_since_merge += 1;
        if shots_since_merge >= config.shots_per_merge {
            shots_since_merge = 0;
            merges_done += 1;

            {
                let mut guard = shared.lock().expect("scattershot shared pool poisoned");
                for block in local_pool.blocks() {
                    guard
                        .pool
                        .upsert(block.bin, block.fitness, Arc::clone(&block.tail_segment), policy.filler_bytes());
                }
                guard.segments.append(&mut local_segments);
            }
            local_pool.clear();

            if coordination.arrive() == Arrival::Leader {
                let mut guard = shared.lock().expect("scattershot shared pool poisoned");
                info!(shot, blocks = guard.pool.len(), "merge complete");
                if merges_done % config.merges_per_segment_gc.max(1) == 0 {
                    let before = guard.segments.len();
                    let blocks: Vec<_> = guard.pool.blocks().to_vec();
                    collect_segments(&mut guard.segments, &blocks);
                    debug!(before, after = guard.segments.len(), "segment gc");
                }
            }
            if coordination.depart() == Arrival::Cancelled {
                break;
            }
        }
    }

    Ok(local_pool)
}

fn replay_chain<R, P, const N: usize>(
    engine: &mut ScriptEngine<R>,
    tail: &Arc<Segment>,
    policy: &P,
) -> Result<(), R::Error>
where
    R: Resource,
    P: Policy<R, N>,
{
    for segment in tail.chain_from_root() {
        let mut rng = StdRng::seed_from_u64(segment.rng_seed);
        for _ in 0..segment.length {
            let inputs = {
                let resource = engine.resource().borrow();
                policy.mutate_frame(&resource, &mut rng)
            };
            engine.advance_frame_write(inputs);
        }
    }
    Ok(())
}
