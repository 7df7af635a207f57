use std::{
    cell::RefCell,
    collections::BTreeMap,
    fmt,
    rc::Rc,
    time::Instant,
};

use scatter_inputs::{Diff, Frame, InputTrack, Inputs};
use scatter_resource::{Resource, SlotHandle, SlotManager};
use tracing::{debug, info};

use crate::{
    level::{Level, LevelStatus},
    metadata::{CachedSave, InputsMetadata},
};

/// Default memory symbol the engine writes per-frame inputs to, matching the layout of
/// [`scatter_inputs::Inputs`] (`u16` buttons, then two `i8` stick axes).
pub const DEFAULT_INPUT_SYMBOL: &str = "gControllerPads";

struct AdhocOutcome<R: Resource> {
    status: LevelStatus,
    save_bank: BTreeMap<Frame, SlotHandle<R>>,
}

/// The hierarchical script engine (§4.4): drives a [`Resource`] frame by frame while
/// maintaining a stack of ad-hoc levels, each with its own diff, save bank, save cache,
/// load tracker and frame counters.
///
/// Unlike the reference implementation this is grounded on, there is only one axis of
/// nesting here (the ad-hoc level stack) rather than two (a tree of distinct script
/// objects, each itself containing an ad-hoc stack). A "child script" is just a closure
/// run through [`ScriptEngine::execute_adhoc`]/[`ScriptEngine::modify_adhoc`], so the
/// state-owner walk that in the original recurses into a parent script object here
/// bottoms out at the base input track once it runs off the bottom of the level stack.
pub struct ScriptEngine<R: Resource> {
    resource: Rc<RefCell<R>>,
    slots: SlotManager<R>,
    start_handle: SlotHandle<R>,
    base_track: InputTrack,
    initial_frame: Frame,
    input_symbol: String,
    levels: Vec<Level<R>>,
}

impl<R: Resource> ScriptEngine<R> {
    /// Build an engine around `resource`, using `base_track` as the read-only input
    /// source below ad-hoc level 0 (the role `.m64` plays in the reference tool).
    pub fn new(resource: R, base_track: InputTrack) -> Result<Self, R::Error> {
        Self::with_input_symbol(resource, base_track, DEFAULT_INPUT_SYMBOL)
    }

    /// As [`ScriptEngine::new`], but writing inputs through a memory symbol other than
    /// [`DEFAULT_INPUT_SYMBOL`].
    pub fn with_input_symbol(
        resource: R,
        base_track: InputTrack,
        input_symbol: impl Into<String>,
    ) -> Result<Self, R::Error> {
        let resource = Rc::new(RefCell::new(resource));
        let slots = SlotManager::new(Rc::clone(&resource));
        let start_id = resource.borrow_mut().save()?;
        let start_handle = slots.start_handle(start_id);
        let initial_frame = resource.borrow().current_frame();

        Ok(Self {
            resource,
            slots,
            start_handle,
            base_track,
            initial_frame,
            input_symbol: input_symbol.into(),
            levels: vec![Level::new()],
        })
    }

    /// The frame the engine was constructed at; saves may never target a frame before
    /// this one.
    pub fn initial_frame(&self) -> Frame {
        self.initial_frame
    }

    /// The next frame [`Resource::advance`] will produce.
    pub fn current_frame(&self) -> Frame {
        self.resource.borrow().current_frame()
    }

    /// Shared handle to the underlying resource, for callers that need to read
    /// simulator memory directly (e.g. to score a candidate state).
    pub fn resource(&self) -> &Rc<RefCell<R>> {
        &self.resource
    }

    fn level(&self) -> usize {
        self.levels.len() - 1
    }

    fn set_inputs(&self, inputs: Inputs) {
        let base = self.resource.borrow().addr(&self.input_symbol);
        unsafe {
            (base as *mut u16).write_unaligned(inputs.buttons);
            (base.add(2) as *mut i8).write_unaligned(inputs.stick_x);
            (base.add(3) as *mut i8).write_unaligned(inputs.stick_y);
        }
    }

    /// Advance one frame using whatever input is already in effect at the current
    /// frame (from a diff, a cache, or the base track).
    pub fn advance_frame_read(&mut self) {
        let frame = self.current_frame();
        let metadata = self.get_inputs_metadata_and_cache(frame);
        self.set_inputs(metadata.inputs);
        self.resource.borrow_mut().advance();
        self.levels[self.level()].status.n_frame_advances += 1;
    }

    /// Advance one frame, recording `inputs` into the current level's diff and
    /// invalidating everything downstream of this frame at this level.
    pub fn advance_frame_write(&mut self, inputs: Inputs) {
        let frame = self.current_frame();
        let level_idx = self.level();
        self.levels[level_idx].status.diff.set(frame, inputs);
        self.levels[level_idx].truncate_after(frame);
        self.set_inputs(inputs);
        self.resource.borrow_mut().advance();
        self.levels[level_idx].status.n_frame_advances += 1;
    }

    /// Load to `diff`'s first frame and play it forward through its last frame,
    /// writing every overridden frame into the current level's diff.
    pub fn apply(&mut self, diff: &Diff) -> Result<(), R::Error> {
        let Some(first) = diff.first_frame() else {
            return Ok(());
        };
        let last = diff.last_frame().unwrap();

        self.load(first)?;
        let level_idx = self.level();
        let current = self.current_frame();
        self.levels[level_idx].truncate_after(current);

        let mut current = current;
        while current <= last {
            let inputs = match diff.get(current) {
                Some(inputs) => {
                    self.levels[level_idx].status.diff.set(current, inputs);
                    inputs
                }
                None => self.get_inputs(current),
            };
            self.set_inputs(inputs);
            self.resource.borrow_mut().advance();
            self.levels[level_idx].status.n_frame_advances += 1;
            current = self.current_frame();
        }
        Ok(())
    }

    /// The input that would apply at `frame` given the current level stack, without
    /// caching it.
    pub fn get_inputs_metadata(&self, frame: Frame) -> InputsMetadata {
        let mut state_owner: Option<usize> = None;
        let mut replacement: Option<Inputs> = None;

        for level_idx in (0..=self.level()).rev() {
            let level = &self.levels[level_idx];

            if state_owner.is_none() {
                if let Some(diff_first) = level.status.diff.first_frame() {
                    if diff_first < frame {
                        state_owner = Some(level_idx);
                    }
                }
            }

            if let Some(inputs) = level.status.diff.get(frame) {
                if let Some(owner) = state_owner {
                    return InputsMetadata {
                        inputs: replacement.unwrap_or(inputs),
                        frame,
                        state_owner_level: owner,
                    };
                }
                if replacement.is_none() {
                    replacement = Some(inputs);
                }
            }

            if let Some(&cached) = level.inputs_cache.get(&frame) {
                let mut metadata = cached;
                if let Some(owner) = state_owner {
                    metadata.state_owner_level = owner;
                }
                if let Some(inputs) = replacement {
                    metadata.inputs = inputs;
                }
                return metadata;
            }
        }

        let owner = state_owner.unwrap_or(0);
        if let Some(inputs) = replacement {
            return InputsMetadata {
                inputs,
                frame,
                state_owner_level: owner,
            };
        }
        InputsMetadata {
            inputs: self.base_track.get(frame),
            frame,
            state_owner_level: owner,
        }
    }

    /// As [`ScriptEngine::get_inputs_metadata`], caching the result at the current
    /// level so future recursion can stop here.
    pub fn get_inputs_metadata_and_cache(&mut self, frame: Frame) -> InputsMetadata {
        let metadata = self.get_inputs_metadata(frame);
        let level_idx = self.level();
        self.levels[level_idx].inputs_cache.insert(frame, metadata);
        metadata
    }

    /// The input in effect at `frame`.
    pub fn get_inputs(&mut self, frame: Frame) -> Inputs {
        self.get_inputs_metadata_and_cache(frame).inputs
    }

    /// The inputs in effect over `first..=last`, as a standalone diff.
    pub fn inputs_range(&self, first: Frame, last: Frame) -> Diff {
        let mut diff = Diff::new();
        for frame in first..=last {
            diff.set(frame, self.get_inputs_metadata(frame).inputs);
        }
        diff
    }

    /// Export the inputs over `0..max_frame` as a standalone track, suitable for
    /// writing out with [`InputTrack::save`].
    pub fn export_track(&self, max_frame: Frame) -> InputTrack {
        let mut records = Vec::new();
        for frame in 0..max_frame {
            records.push(self.get_inputs_metadata(frame).inputs);
        }
        InputTrack::from_records(records)
    }

    fn frame_counter_value(&self, metadata: InputsMetadata) -> u64 {
        *self.levels[metadata.state_owner_level]
            .frame_counter
            .get(&metadata.frame)
            .unwrap_or(&0)
    }

    fn increment_frame_counter(&mut self, metadata: InputsMetadata) -> u64 {
        let entry = self.levels[metadata.state_owner_level]
            .frame_counter
            .entry(metadata.frame)
            .or_insert(0);
        *entry += 1;
        *entry
    }

    fn resolve_save(&self, save: CachedSave) -> &SlotHandle<R> {
        if save.is_start {
            &self.start_handle
        } else {
            self.levels[save.level]
                .save_bank
                .get(&save.frame)
                .expect("cached save no longer exists in its level's save bank")
        }
    }

    fn do_load(&self, save: CachedSave) -> Result<(), R::Error> {
        self.slots.load(self.resolve_save(save))
    }

    /// The most recent save at or before `frame`, searching the level stack from the
    /// current level down to level 0, never crossing a level's diff boundary (doing so
    /// would desync: the save would predate inputs this level has already committed).
    pub fn get_latest_save(&self, frame: Frame) -> CachedSave {
        assert!(
            frame >= self.initial_frame,
            "attempted to locate a save before the initial frame"
        );

        let mut early_frame = frame;
        let mut best: Option<CachedSave> = None;

        for level_idx in (0..=self.level()).rev() {
            let level = &self.levels[level_idx];

            if let Some((&save_frame, _)) = level.save_bank.range(..=early_frame).next_back() {
                if best.map_or(true, |b| save_frame >= b.frame) {
                    best = Some(CachedSave {
                        frame: save_frame,
                        level: level_idx,
                        is_start: false,
                    });
                }
            }

            if let Some((&cache_frame, &cached)) = level.save_cache.range(..=early_frame).next_back() {
                if best.map_or(true, |b| cache_frame >= b.frame) {
                    match level.load_tracker.range(cache_frame..).next() {
                        Some(&tracked) if tracked < frame => best = Some(cached),
                        _ => return cached,
                    }
                }
            }

            early_frame = match level.status.diff.first_frame() {
                Some(diff_first) => diff_first.min(early_frame),
                None => early_frame,
            };

            if let Some(b) = best {
                if b.frame >= early_frame {
                    return b;
                }
            }
        }

        best.unwrap_or_else(|| CachedSave::start(self.initial_frame))
    }

    /// As [`ScriptEngine::get_latest_save`], caching the result and recording that a
    /// load targeting `frame` consulted it.
    pub fn get_latest_save_and_cache(&mut self, frame: Frame) -> CachedSave {
        let save = self.get_latest_save(frame);
        let level_idx = self.level();
        self.levels[level_idx].save_cache.insert(save.frame, save);
        self.levels[level_idx].load_tracker.insert(frame);
        save
    }

    /// Bring the resource to `frame`, restoring from the best available save and
    /// replaying forward, caching saves and the inputs used along the way.
    pub fn load(&mut self, frame: Frame) -> Result<(), R::Error> {
        self.load_base(frame, false)
    }

    /// As [`ScriptEngine::load`], but for a target unlikely to be revisited: the save
    /// used isn't cached, and a fresh save is always created at the destination.
    pub fn long_load(&mut self, frame: Frame) -> Result<(), R::Error> {
        let current = self.current_frame();
        let save = self.get_latest_save(frame);
        if frame < current {
            self.do_load(save)?;
            self.levels[self.level()].status.n_loads += 1;
        } else if save.frame > frame && self.resource.borrow().should_load(save.frame - current) {
            self.do_load(save)?;
        }

        while self.current_frame() < frame {
            self.advance_frame_read();
        }
        self.save()?;
        Ok(())
    }

    fn load_base(&mut self, frame: Frame, desync: bool) -> Result<(), R::Error> {
        let current = self.current_frame();
        let save = self.get_latest_save_and_cache(frame);

        if desync || frame < current {
            self.do_load(save)?;
            self.levels[self.level()].status.n_loads += 1;
        } else if save.frame > frame && self.resource.borrow().should_load(save.frame - current) {
            self.do_load(save)?;
        }

        let mut frame_counter = 0u64;
        while self.current_frame() < frame {
            self.advance_frame_read();
            let current = self.current_frame();
            let metadata = self.get_inputs_metadata_and_cache(current);
            frame_counter += self.increment_frame_counter(metadata);

            if self.resource.borrow().should_save(frame_counter) {
                let level_idx = self.level();
                let save = self.save_at_level(metadata.state_owner_level)?;
                self.levels[level_idx].save_cache.insert(current, save);
                frame_counter = 0;
            }
        }
        Ok(())
    }

    /// Create a save at the current frame, attributed to whichever level owns it.
    pub fn save(&mut self) -> Result<CachedSave, R::Error> {
        let current = self.current_frame();
        let metadata = self.get_inputs_metadata(current);
        let level_idx = self.level();
        let save = self.save_at_level(metadata.state_owner_level)?;
        self.levels[level_idx].save_cache.insert(current, save);
        Ok(save)
    }

    fn save_at_level(&mut self, level_idx: usize) -> Result<CachedSave, R::Error> {
        let current = self.current_frame();
        if !self.levels[level_idx].save_bank.contains_key(&current) {
            let handle = self.slots.save()?;
            self.levels[level_idx].save_bank.insert(current, handle);
            self.levels[level_idx].status.n_saves += 1;
        }
        Ok(CachedSave {
            frame: current,
            level: level_idx,
            is_start: false,
        })
    }

    /// Save only if the cost model judges it worthwhile given how long it's been since
    /// the last save.
    pub fn optional_save(&mut self) -> Result<(), R::Error> {
        let current = self.current_frame();
        let latest = self.get_latest_save_and_cache(current);
        let mut frame_counter = 0u64;
        for frame in (latest.frame + 1)..=current {
            let metadata = self.get_inputs_metadata_and_cache(frame);
            frame_counter += self.frame_counter_value(metadata);
            if self.resource.borrow().should_save(frame_counter / 2) {
                let level_idx = self.level();
                let save = self.save_at_level(metadata.state_owner_level)?;
                self.levels[level_idx].save_cache.insert(current, save);
                break;
            }
        }
        Ok(())
    }

    /// Remove a save from `level`'s save bank, dropping (and so erasing) its slot.
    pub fn delete_save(&mut self, frame: Frame, level_idx: usize) {
        self.levels[level_idx].save_bank.remove(&frame);
    }

    /// Truncate the current level's diff from `frame` onward (inclusive) and reload.
    pub fn rollback(&mut self, frame: Frame) -> Result<(), R::Error> {
        let level_idx = self.level();
        if let Some(first_frame) = self.levels[level_idx].status.diff.first_at_or_after(frame) {
            self.levels[level_idx].status.diff.truncate_from(frame);
            self.levels[level_idx].truncate_after(first_frame);
        }
        self.load_base(frame, false)
    }

    /// Truncate the current level's diff before `frame` and reload; like
    /// [`ScriptEngine::rollback`] but for scripts editing the past and resuming from
    /// `frame` onward rather than discarding everything from `frame` on.
    pub fn roll_forward(&mut self, frame: Frame) -> Result<(), R::Error> {
        let level_idx = self.level();
        let current = self.current_frame();
        let desync = self.levels[level_idx]
            .status
            .diff
            .first_frame()
            .map_or(false, |f| f < current);

        if let Some(first_frame) = self.levels[level_idx].status.diff.first_frame() {
            self.levels[level_idx].status.diff.truncate_before(frame);
            self.levels[level_idx].truncate_after(first_frame);
        }
        self.load_base(frame, desync)
    }

    /// Discard the current level's diff and save bank entirely, then reload.
    pub fn restore(&mut self, frame: Frame) -> Result<(), R::Error> {
        let level_idx = self.level();
        let current = self.current_frame();
        let desync = self.levels[level_idx]
            .status
            .diff
            .first_frame()
            .map_or(false, |f| f < current);

        if let Some(first_frame) = self.levels[level_idx].status.diff.first_frame() {
            self.levels[level_idx].status.diff.truncate_from(frame);
            self.levels[level_idx].truncate_after(first_frame);
        }
        self.load_base(frame, desync)
    }

    /// True if the bottommost (non-ad-hoc) level's diff is empty.
    pub fn is_diff_empty(&self) -> bool {
        self.levels[0].status.diff.is_empty()
    }

    /// The current level's diff.
    pub fn diff(&self) -> &Diff {
        &self.levels[self.level()].status.diff
    }

    /// The bottommost level's diff.
    pub fn base_diff(&self) -> &Diff {
        &self.levels[0].status.diff
    }

    fn execute_adhoc_base<F>(&mut self, body: F) -> Result<AdhocOutcome<R>, R::Error>
    where
        F: FnOnce(&mut Self) -> Result<bool, R::Error>,
    {
        self.optional_save()?;

        let depth = self.levels.len();
        debug!(depth, frame = self.current_frame(), "entering ad-hoc scope");

        self.levels.push(Level::new());
        self.levels.last_mut().unwrap().status.validated = true;

        let start = Instant::now();
        let executed = body(self)?;
        let duration = start.elapsed();

        let level = self.levels.last_mut().unwrap();
        level.status.executed = executed;
        level.status.asserted = executed;
        level.status.execution_duration = duration;

        let popped = self.levels.pop().expect("ad-hoc level stack underflow");
        debug!(depth, executed, ?duration, "leaving ad-hoc scope");

        let parent = self.levels.last_mut().expect("ad-hoc level stack underflow");
        parent.status.n_loads += popped.status.n_loads;
        parent.status.n_saves += popped.status.n_saves;
        parent.status.n_frame_advances += popped.status.n_frame_advances;

        Ok(AdhocOutcome {
            status: popped.status,
            save_bank: popped.save_bank,
        })
    }

    fn revert(
        &mut self,
        frame: Frame,
        child_diff: &Diff,
        mut child_save_bank: BTreeMap<Frame, SlotHandle<R>>,
    ) -> Result<(), R::Error> {
        let desync = child_diff
            .first_frame()
            .map_or(false, |f| f < self.current_frame());
        if desync {
            debug!(frame, "reverting ad-hoc scope with desync");
        }

        if let Some(first_frame) = child_diff.first_frame() {
            let desynced: Vec<Frame> = child_save_bank.range(first_frame..).map(|(&f, _)| f).collect();
            for f in desynced {
                child_save_bank.remove(&f);
            }
        }

        let level_idx = self.level();
        self.levels[level_idx].save_bank.extend(child_save_bank);
        self.load_base(frame, desync)
    }

    fn apply_child_diff(
        &mut self,
        status: LevelStatus,
        child_save_bank: BTreeMap<Frame, SlotHandle<R>>,
        initial_frame: Frame,
    ) -> Result<(), R::Error> {
        if !status.asserted {
            return self.revert(initial_frame, &status.diff, child_save_bank);
        }
        debug!(initial_frame, "committing ad-hoc child diff");

        let level_idx = self.level();
        self.levels[level_idx].save_bank.extend(child_save_bank);

        let Some(first) = status.diff.first_frame() else {
            return self.load(initial_frame);
        };
        let last = status.diff.last_frame().unwrap();

        self.levels[level_idx].truncate_after(first);
        for frame in first..=last {
            if let Some(inputs) = status.diff.get(frame) {
                self.levels[level_idx].status.diff.set(frame, inputs);
            }
        }
        self.load(last + 1)
    }

    /// Run `body` in a fresh ad-hoc level, always reverting its diff and unsynced
    /// saves afterward regardless of outcome. Use for read-only probes.
    pub fn execute_adhoc<F>(&mut self, body: F) -> Result<LevelStatus, R::Error>
    where
        F: FnOnce(&mut Self) -> Result<bool, R::Error>,
    {
        let initial_frame = self.current_frame();
        let outcome = self.execute_adhoc_base(body)?;
        self.revert(initial_frame, &outcome.status.diff, outcome.save_bank)?;
        Ok(outcome.status)
    }

    /// Run `body` in a fresh ad-hoc level, committing its diff and saves into the
    /// current level if it succeeded, reverting them otherwise.
    pub fn modify_adhoc<F>(&mut self, body: F) -> Result<LevelStatus, R::Error>
    where
        F: FnOnce(&mut Self) -> Result<bool, R::Error>,
    {
        let initial_frame = self.current_frame();
        let outcome = self.execute_adhoc_base(body)?;
        let status = outcome.status.clone();
        self.apply_child_diff(outcome.status, outcome.save_bank, initial_frame)?;
        Ok(status)
    }

    /// As [`ScriptEngine::execute_adhoc`], but always reports an empty diff: for probes
    /// whose only observable effect should be their return value.
    pub fn test_adhoc<F>(&mut self, body: F) -> Result<LevelStatus, R::Error>
    where
        F: FnOnce(&mut Self) -> Result<bool, R::Error>,
    {
        let mut status = self.execute_adhoc(body)?;
        status.diff = Diff::new();
        Ok(status)
    }

    /// The validate/execute/assert lifecycle a top-level script follows: `validation`
    /// gates `execution` (reverted either way), which gates `assertion` (also
    /// reverted); only `execution`'s effects are ever committed, and only once
    /// `assertion` has had a chance to check them against something that still gets
    /// rolled back.
    pub fn run<V, E, A>(&mut self, validation: V, execution: E, assertion: A) -> Result<LevelStatus, R::Error>
    where
        V: FnOnce(&mut Self) -> Result<bool, R::Error>,
        A: FnOnce(&mut Self) -> Result<bool, R::Error>,
        E: FnOnce(&mut Self) -> Result<bool, R::Error>,
    {
        let level_idx = self.level();
        info!(level_idx, frame = self.current_frame(), "running script");

        let start = Instant::now();
        let validated = self.execute_adhoc(validation)?.executed;
        self.levels[level_idx].status.validated = validated;
        self.levels[level_idx].status.validation_duration = start.elapsed();
        if !validated {
            info!(level_idx, "script failed validation");
            return Ok(self.levels[level_idx].status.clone());
        }

        let start = Instant::now();
        let executed = self.modify_adhoc(execution)?.executed;
        self.levels[level_idx].status.executed = executed;
        self.levels[level_idx].status.execution_duration = start.elapsed();
        if !executed {
            info!(level_idx, "script execution did not commit");
            return Ok(self.levels[level_idx].status.clone());
        }

        let start = Instant::now();
        let asserted = self.execute_adhoc(assertion)?.executed;
        self.levels[level_idx].status.asserted = asserted;
        self.levels[level_idx].status.assertion_duration = start.elapsed();
        info!(level_idx, asserted, "script complete");

        Ok(self.levels[level_idx].status.clone())
    }
}

impl<R: Resource> fmt::Debug for ScriptEngine<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("current_frame", &self.current_frame())
            .field("level", &self.level())
            .finish_non_exhaustive()
    }
}
