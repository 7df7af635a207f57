use rand::rngs::StdRng;
use scatter_inputs::Inputs;
use scatter_resource::Resource;

/// A fixed-size byte projection of simulator state (§3 `Bin`), used as the explorer's
/// equivalence class.
///
/// `N` is the projection's width in bytes: the same role `TState` plays in the
/// reference implementation's `StateBin<TState>`, made a compile-time constant instead
/// of a template parameter.
pub type Bin<const N: usize> = [u8; N];

/// The game-specific policy injected into the explorer (§1: "scoring, input
/// generation, and state-projection policies ... injected via capability objects").
///
/// One trait bundles all three because they're always supplied together and usually
/// share game-specific lookup logic (e.g. resolving the same `MarioState*` to read both
/// the projection and the fitness score); callers are free to split the actual work
/// across helper types and have this trait just dispatch to them.
pub trait Policy<R: Resource, const N: usize>: Send + Sync {
    /// Project `resource`'s current state into a bin.
    ///
    /// Byte offsets returned by [`Policy::filler_bytes`] are excluded from the
    /// explorer's hash of this bin but not from equality, so that near-duplicate states
    /// (differing only in noisy fields, e.g. an animation timer) still collide into the
    /// same hash bucket while remaining distinguishable on exact comparison.
    fn project(&self, resource: &R) -> Bin<N>;

    /// Byte offsets within the bin that should be excluded from hashing. Empty by
    /// default (every byte participates).
    fn filler_bytes(&self) -> &[usize] {
        &[]
    }

    /// Score `resource`'s current state; higher is better.
    fn fitness(&self, resource: &R) -> f64;

    /// Produce the input to write for the current frame, drawing randomness from
    /// `rng`. Called once per frame while a segment is generated or replayed, so it
    /// must be a pure function of `(resource state, rng)` for replay to reproduce the
    /// original trajectory bit-for-bit.
    fn mutate_frame(&self, resource: &R, rng: &mut StdRng) -> Inputs;
}
