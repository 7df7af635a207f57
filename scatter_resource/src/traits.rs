use std::{error::Error as StdError, fmt};

use crate::Frame;

/// A deterministic per-instance simulator (§4.1).
///
/// Implementations must be fully deterministic given `(initial state, input sequence)`:
/// no thread scheduling inside the simulator, no uninitialized memory in savestates.
/// `advance` reads the current input from whatever memory window `addr` exposes and
/// must not fail; `save`/`load` fail only on resource exhaustion.
pub trait Resource {
    /// Opaque identifier for a savestate slot, handed back by [`Resource::save`].
    type SlotId: Copy + Eq + fmt::Debug;

    /// Error surfaced by slot allocation failures.
    type Error: StdError + 'static;

    /// Step the simulator one frame forward, consuming whatever input was most
    /// recently written into the memory window exposed by [`Resource::addr`].
    fn advance(&mut self);

    /// Snapshot full simulator state, returning a handle to the new slot.
    fn save(&mut self) -> Result<Self::SlotId, Self::Error>;

    /// Restore simulator state from a previously saved slot, byte-exact.
    fn load(&mut self, id: Self::SlotId) -> Result<(), Self::Error>;

    /// Release a slot. Infallible: freeing resources cannot meaningfully fail here.
    fn erase(&mut self, id: Self::SlotId);

    /// The next frame index that will be produced by [`Resource::advance`].
    fn current_frame(&self) -> Frame;

    /// A process-local, mutable pointer into the simulator's memory for `symbol`.
    ///
    /// Not portable across loads of a different simulator binary. Reads/writes through
    /// this pointer never fail, but racing them against a concurrent `advance` is
    /// undefined behavior - the caller is responsible for sequencing.
    ///
    /// # Panics
    ///
    /// Implementations should panic if `symbol` is undefined; this is a logical-misuse
    /// condition (§7), not a recoverable error.
    fn addr(&self, symbol: &str) -> *mut u8;

    /// Cost-model hint: would creating a save now pay for itself over roughly
    /// `est_future_advances` upcoming re-advances?
    fn should_save(&self, est_future_advances: u64) -> bool;

    /// Cost-model hint: given the simulator is `frame_delta` frames behind (or ahead
    /// of) a candidate save, is restoring that save cheaper than frame-advancing?
    fn should_load(&self, frame_delta: u64) -> bool;
}
