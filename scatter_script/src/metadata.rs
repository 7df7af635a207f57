use scatter_inputs::{Frame, Inputs};

/// Where an input at a given frame came from, and which level owns its frame counter
/// and save attribution (the "state owner", §4.4.2).
///
/// The state owner is not necessarily the level that defines the input: a level whose
/// diff overrides a frame but whose ancestor already has a save or cache entry at that
/// frame keeps the ancestor as the state owner, since that is where the frame was first
/// reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputsMetadata {
    /// The input in effect at this frame.
    pub inputs: Inputs,
    /// The frame these inputs apply to.
    pub frame: Frame,
    /// The level whose `frame_counter`/save attribution this frame belongs to.
    pub state_owner_level: usize,
}

/// Where a save for `frame` lives (§4.4.2, `SaveMetadata`).
///
/// Like [`InputsMetadata`], this is a lightweight reference, not a save itself: the
/// save it names may have since been evicted, in which case resolving it through
/// [`crate::ScriptEngine`] returns `None` and the caller should fall back to an earlier
/// save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedSave {
    /// The frame the save was taken at.
    pub frame: Frame,
    /// The level owning the save (ignored when `is_start` is set).
    pub level: usize,
    /// True for the distinguished pre-script save, which is always valid and is not
    /// stored in any level's save bank.
    pub is_start: bool,
}

impl CachedSave {
    pub(crate) fn start(initial_frame: Frame) -> Self {
        Self {
            frame: initial_frame,
            level: 0,
            is_start: true,
        }
    }
}
