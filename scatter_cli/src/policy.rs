use rand::{rngs::StdRng, Rng};
use scatter_dll_resource::DllResource;
use scatter_explorer::{Bin, Policy};
use scatter_inputs::Inputs;
use scatter_resource::Resource;

/// Width, in bytes, of the state projection the default policy reads out of simulator
/// memory. A game-specific policy is free to use a different width; the CLI's built-in
/// one fixes it so it can be wired up without a generic parameter in `Configuration`.
pub const PROJECTION_BYTES: usize = 8;

/// The `Projection`/`Fitness`/`Mutation` capability object the CLI supplies when no
/// game-specific one is plugged in (§1, §2: these are explicitly external to the core).
///
/// Reads the projection and fitness directly out of the simulator's memory image via
/// [`Resource::addr`], the same raw-pointer access `bitfs-turnaround/src/main.cpp`'s
/// `MainScript::execution` uses to read `gCamera`/`gMarioState`; mutation picks a
/// uniformly random stick position and random subset of `allowed_buttons` each frame,
/// in place of that script's yaw-targeted `Inputs::GetClosestInputByYawExact` (which is
/// BitFS-specific and out of scope here).
#[derive(Debug)]
pub struct RawMemoryPolicy {
    projection_symbol: String,
    projection_offset: usize,
    fitness_symbol: String,
    fitness_offset: usize,
    allowed_buttons: u16,
}

impl RawMemoryPolicy {
    /// Build a policy reading the projection and fitness from fixed offsets within two
    /// (possibly identical) exported symbols, mutating with inputs drawn from
    /// `allowed_buttons`.
    pub fn new(
        projection_symbol: impl Into<String>,
        projection_offset: usize,
        fitness_symbol: impl Into<String>,
        fitness_offset: usize,
        allowed_buttons: u16,
    ) -> Self {
        Self {
            projection_symbol: projection_symbol.into(),
            projection_offset,
            fitness_symbol: fitness_symbol.into(),
            fitness_offset,
            allowed_buttons,
        }
    }
}

impl Policy<DllResource, PROJECTION_BYTES> for RawMemoryPolicy {
    fn project(&self, resource: &DllResource) -> Bin<PROJECTION_BYTES> {
        let base = resource.addr(&self.projection_symbol);
        let mut bin = [0u8; PROJECTION_BYTES];
        unsafe {
            let src = base.add(self.projection_offset);
            std::ptr::copy_nonoverlapping(src, bin.as_mut_ptr(), PROJECTION_BYTES);
        }
        bin
    }

    fn fitness(&self, resource: &DllResource) -> f64 {
        let base = resource.addr(&self.fitness_symbol);
        let mut raw = [0u8; 4];
        unsafe {
            let src = base.add(self.fitness_offset);
            std::ptr::copy_nonoverlapping(src, raw.as_mut_ptr(), 4);
        }
        f32::from_ne_bytes(raw) as f64
    }

    fn mutate_frame(&self, _resource: &DllResource, rng: &mut StdRng) -> Inputs {
        let stick_x = rng.gen_range(-80..=80) as i8;
        let stick_y = rng.gen_range(-80..=80) as i8;
        let buttons = rng.gen::<u16>() & self.allowed_buttons;
        Inputs::new(buttons, stick_x, stick_y)
    }
}
