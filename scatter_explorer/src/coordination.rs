use std::sync::{
    atomic::{AtomicBool, Ordering},
    Condvar, Mutex,
};

/// What a caller of [`Gate::wait`] should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Arrival {
    /// This thread completed the generation; it alone should run the single-writer
    /// merge/GC work (mirrors `BarrierWaitResult::is_leader`).
    Leader,
    /// Another thread completed the generation.
    Follower,
    /// The run was cancelled before this generation could complete; there is no
    /// merge to run.
    Cancelled,
}

struct GateState {
    arrived: usize,
    generation: u64,
}

/// Like [`std::sync::Barrier`], but every blocked or future waiter can be woken early
/// by [`Gate::cancel`] instead of only by the full thread count arriving.
///
/// A plain `Barrier` can't express this: once a thread is parked inside its `wait`,
/// nothing short of every other thread also arriving can release it, so a worker that
/// dies before reaching the barrier leaves its still-running peers blocked forever
/// (§5's merge barrier; §7's "fatal" Resource errors are supposed to abort the whole
/// run, not hang it).
struct Gate {
    state: Mutex<GateState>,
    condvar: Condvar,
    threshold: usize,
    cancelled: AtomicBool,
}

impl Gate {
    fn new(threshold: usize) -> Self {
        Self {
            state: Mutex::new(GateState {
                arrived: 0,
                generation: 0,
            }),
            condvar: Condvar::new(),
            threshold,
            cancelled: AtomicBool::new(false),
        }
    }

    fn wait(&self) -> Arrival {
        if self.cancelled.load(Ordering::Acquire) {
            return Arrival::Cancelled;
        }

        let mut state = self.state.lock().expect("scattershot merge gate poisoned");
        let generation = state.generation;
        state.arrived += 1;

        if state.arrived >= self.threshold {
            state.arrived = 0;
            state.generation += 1;
            self.condvar.notify_all();
            return Arrival::Leader;
        }

        while state.generation == generation && !self.cancelled.load(Ordering::Acquire) {
            state = self.condvar.wait(state).expect("scattershot merge gate poisoned");
        }

        if self.cancelled.load(Ordering::Acquire) {
            Arrival::Cancelled
        } else {
            Arrival::Follower
        }
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        let _state = self.state.lock().expect("scattershot merge gate poisoned");
        self.condvar.notify_all();
    }
}

/// The pair of merge-barrier gates (§4.5 "Merge barrier") every worker thread
/// rendezvouses at, plus the shared cancellation flag §5 describes as the
/// cooperative alternative to a hard-locked barrier.
///
/// One designated leader runs the single-writer merge and, periodically, the segment
/// GC, strictly between the `arrive` and `depart` gates so no worker samples the
/// shared pool while it's being written.
pub(crate) struct Coordination {
    arrive: Gate,
    depart: Gate,
}

impl Coordination {
    pub(crate) fn new(total_threads: usize) -> Self {
        Self {
            arrive: Gate::new(total_threads),
            depart: Gate::new(total_threads),
        }
    }

    pub(crate) fn arrive(&self) -> Arrival {
        self.arrive.wait()
    }

    pub(crate) fn depart(&self) -> Arrival {
        self.depart.wait()
    }

    /// True if some worker has already hit a fatal error (§7) and the run should
    /// wind down. Checked at shot boundaries (§5) so a worker mid-shot notices
    /// promptly rather than only at its next scheduled merge.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.arrive.cancelled.load(Ordering::Acquire)
    }

    /// Wake every worker blocked in (or about to enter) either gate, and make every
    /// future call return [`Arrival::Cancelled`]. Called once a worker thread is
    /// about to exit with a fatal error, so its peers never wait on an arrival that
    /// will not come.
    pub(crate) fn cancel(&self) {
        self.arrive.cancel();
        self.depart.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use super::*;

    #[test]
    fn all_arrivals_produce_exactly_one_leader() {
        let coordination = Arc::new(Coordination::new(4));
        let leaders: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let coordination = Arc::clone(&coordination);
                    scope.spawn(move || coordination.arrive())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(leaders.iter().filter(|a| **a == Arrival::Leader).count(), 1);
        assert_eq!(leaders.iter().filter(|a| **a == Arrival::Follower).count(), 3);
    }

    #[test]
    fn cancel_wakes_a_thread_blocked_waiting_for_a_peer_that_will_never_arrive() {
        let coordination = Arc::new(Coordination::new(2));

        let waiter = {
            let coordination = Arc::clone(&coordination);
            thread::spawn(move || coordination.arrive())
        };

        // Give the waiter a chance to block on the one missing arrival before the
        // peer that would have supplied it dies instead.
        thread::sleep(Duration::from_millis(50));
        coordination.cancel();

        assert_eq!(waiter.join().unwrap(), Arrival::Cancelled);
        assert_eq!(coordination.arrive(), Arrival::Cancelled);
        assert!(coordination.is_cancelled());
    }
}
