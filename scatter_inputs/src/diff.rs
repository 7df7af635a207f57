use std::collections::BTreeMap;

use crate::{Frame, Inputs};

/// A sparse overlay of per-frame inputs atop an [`InputTrack`](crate::InputTrack).
///
/// Invariant (enforced by callers, not by this type): every key is `>=` the owning
/// script's initial frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    frames: BTreeMap<Frame, Inputs>,
}

impl Diff {
    /// An empty diff.
    pub fn new() -> Self {
        Self {
            frames: BTreeMap::new(),
        }
    }

    /// Record (or overwrite) the input at `frame`.
    pub fn set(&mut self, frame: Frame, inputs: Inputs) {
        self.frames.insert(frame, inputs);
    }

    /// The recorded input at `frame`, if this diff overrides it.
    pub fn get(&self, frame: Frame) -> Option<Inputs> {
        self.frames.get(&frame).copied()
    }

    /// True if this diff has no entries.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The first (lowest) frame this diff overrides, if any.
    pub fn first_frame(&self) -> Option<Frame> {
        self.frames.keys().next().copied()
    }

    /// The last (highest) frame this diff overrides, if any.
    pub fn last_frame(&self) -> Option<Frame> {
        self.frames.keys().next_back().copied()
    }

    /// Iterate over `(frame, inputs)` pairs in frame order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (Frame, Inputs)> + '_ {
        self.frames.iter().map(|(&f, &i)| (f, i))
    }

    /// Remove all entries with frame `>= frame` (used when a write invalidates the future).
    pub fn truncate_from(&mut self, frame: Frame) {
        self.frames.retain(|&f, _| f < frame);
    }

    /// Remove all entries with frame `< frame` (used by `roll_forward`).
    pub fn truncate_before(&mut self, frame: Frame) {
        self.frames.retain(|&f, _| f >= frame);
    }

    /// Merge `other` into `self`, with `other`'s entries taking priority on conflict.
    pub fn extend(&mut self, other: &Diff) {
        for (frame, inputs) in other.iter() {
            self.frames.insert(frame, inputs);
        }
    }

    /// The lowest overridden frame `>= frame`, if any.
    pub fn first_at_or_after(&self, frame: Frame) -> Option<Frame> {
        self.frames.range(frame..).next().map(|(&f, _)| f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_from_is_inclusive() {
        let mut diff = Diff::new();
        diff.set(10, Inputs::new(1, 0, 0));
        diff.set(20, Inputs::new(2, 0, 0));
        diff.truncate_from(20);
        assert_eq!(diff.get(10), Some(Inputs::new(1, 0, 0)));
        assert_eq!(diff.get(20), None);
    }

    #[test]
    fn truncate_before_is_exclusive_of_frame() {
        let mut diff = Diff::new();
        diff.set(10, Inputs::new(1, 0, 0));
        diff.set(20, Inputs::new(2, 0, 0));
        diff.truncate_before(20);
        assert_eq!(diff.get(10), None);
        assert_eq!(diff.get(20), Some(Inputs::new(2, 0, 0)));
    }
}
