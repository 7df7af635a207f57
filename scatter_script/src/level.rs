use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use scatter_inputs::Frame;
use scatter_resource::SlotHandle;

use crate::metadata::{CachedSave, InputsMetadata};

/// Per-level bookkeeping for one entry on the ad-hoc level stack (§4.4).
///
/// Pushed by [`crate::ScriptEngine::execute_adhoc_base`], popped (and folded back into
/// the parent) by whichever of `execute_adhoc`/`modify_adhoc` invoked it. The diff
/// itself lives on [`LevelStatus`] rather than here, matching how the rest of the level
/// state is exposed to callers as part of a level's status.
pub(crate) struct Level<R: scatter_resource::Resource> {
    pub(crate) save_bank: BTreeMap<Frame, SlotHandle<R>>,
    pub(crate) save_cache: BTreeMap<Frame, CachedSave>,
    pub(crate) load_tracker: BTreeSet<Frame>,
    pub(crate) frame_counter: BTreeMap<Frame, u64>,
    pub(crate) inputs_cache: BTreeMap<Frame, InputsMetadata>,
    pub(crate) status: LevelStatus,
}

impl<R: scatter_resource::Resource> Level<R> {
    pub(crate) fn new() -> Self {
        Self {
            save_bank: BTreeMap::new(),
            save_cache: BTreeMap::new(),
            load_tracker: BTreeSet::new(),
            frame_counter: BTreeMap::new(),
            inputs_cache: BTreeMap::new(),
            status: LevelStatus::default(),
        }
    }

    /// Drop every save/cache/counter entry belonging to frames `>= frame`, and every
    /// cached input from `frame` onward. Mirrors the asymmetric erase boundaries used
    /// throughout `Script.t.hpp`: input caches use a `>=` (lower_bound) boundary because
    /// the frame itself is about to be overwritten, while save-ish maps use a strict `>`
    /// (upper_bound) boundary because a save taken exactly on `frame` is still valid
    /// state for that frame.
    pub(crate) fn truncate_after(&mut self, frame: Frame) {
        self.inputs_cache.retain(|&f, _| f < frame);
        self.frame_counter.retain(|&f, _| f <= frame);
        self.save_bank.retain(|&f, _| f <= frame);
        self.save_cache.retain(|&f, _| f <= frame);
    }
}

/// Outcome and timing of one ad-hoc scope or top-level `run()` (§4.4, §6).
#[derive(Debug, Clone, Default)]
pub struct LevelStatus {
    /// Whether `validation` returned true.
    pub validated: bool,
    /// Whether the body (`execution`, or an ad-hoc closure) returned true.
    pub executed: bool,
    /// Whether `assertion` returned true.
    pub asserted: bool,
    /// Diff accumulated at this level.
    pub diff: Diff,
    /// Savestates created while this level was active.
    pub n_saves: u64,
    /// Loads performed while this level was active.
    pub n_loads: u64,
    /// Frames advanced while this level was active.
    pub n_frame_advances: u64,
    /// Wall-clock time spent validating.
    pub validation_duration: Duration,
    /// Wall-clock time spent executing.
    pub execution_duration: Duration,
    /// Wall-clock time spent asserting.
    pub assertion_duration: Duration,
}
