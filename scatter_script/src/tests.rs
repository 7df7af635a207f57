use std::{cell::UnsafeCell, collections::HashMap, convert::Infallible};

use scatter_inputs::{InputTrack, Inputs};
use scatter_resource::Resource;

use crate::ScriptEngine;

/// A tiny in-memory simulator: `advance` folds whatever buttons value is in its input
/// window into a running accumulator. Good enough to exercise save/load/diff semantics
/// without a real game binary.
struct MockResource {
    memory: UnsafeCell<[u8; 16]>,
    frame: u64,
    slots: HashMap<u64, ([u8; 16], u64)>,
    next_id: u64,
}

impl MockResource {
    fn new() -> Self {
        Self {
            memory: UnsafeCell::new([0; 16]),
            frame: 0,
            slots: HashMap::new(),
            next_id: 1,
        }
    }

    fn mem_ptr(&self) -> *mut u8 {
        self.memory.get() as *mut u8
    }

    fn accumulator(&self) -> u64 {
        unsafe { u64::from_le_bytes(std::array::from_fn(|i| *self.mem_ptr().add(8 + i))) }
    }
}

impl Resource for MockResource {
    type SlotId = u64;
    type Error = Infallible;

    fn advance(&mut self) {
        let buttons = unsafe { u16::from_le_bytes([*self.mem_ptr(), *self.mem_ptr().add(1)]) };
        let acc = self.accumulator().wrapping_add(buttons as u64);
        unsafe {
            for (i, byte) in acc.to_le_bytes().iter().enumerate() {
                *self.mem_ptr().add(8 + i) = *byte;
            }
        }
        self.frame += 1;
    }

    fn save(&mut self) -> Result<Self::SlotId, Self::Error> {
        let mut snapshot = [0u8; 16];
        unsafe { std::ptr::copy_nonoverlapping(self.mem_ptr(), snapshot.as_mut_ptr(), 16) };
        let id = self.next_id;
        self.next_id += 1;
        self.slots.insert(id, (snapshot, self.frame));
        Ok(id)
    }

    fn load(&mut self, id: Self::SlotId) -> Result<(), Self::Error> {
        let (snapshot, frame) = self.slots[&id];
        unsafe { std::ptr::copy_nonoverlapping(snapshot.as_ptr(), self.mem_ptr(), 16) };
        self.frame = frame;
        Ok(())
    }

    fn erase(&mut self, id: Self::SlotId) {
        self.slots.remove(&id);
    }

    fn current_frame(&self) -> u64 {
        self.frame
    }

    fn addr(&self, symbol: &str) -> *mut u8 {
        assert_eq!(symbol, "gControllerPads", "mock only exposes the input window");
        self.mem_ptr()
    }

    fn should_save(&self, _est_future_advances: u64) -> bool {
        false
    }

    fn should_load(&self, frame_delta: u64) -> bool {
        frame_delta > 1_000_000
    }
}

fn engine() -> ScriptEngine<MockResource> {
    ScriptEngine::new(MockResource::new(), InputTrack::empty()).unwrap()
}

#[test]
fn advancing_with_no_inputs_leaves_accumulator_at_zero() {
    let mut engine = engine();
    for _ in 0..5 {
        engine.advance_frame_read();
    }
    assert_eq!(engine.current_frame(), 5);
    assert_eq!(engine.resource().borrow().accumulator(), 0);
}

#[test]
fn write_then_read_replays_the_same_input() {
    let mut engine = engine();
    engine.advance_frame_write(Inputs::new(7, 0, 0));
    engine.advance_frame_write(Inputs::new(3, 0, 0));
    assert_eq!(engine.resource().borrow().accumulator(), 10);
    assert_eq!(engine.current_frame(), 2);

    // Replaying through get_inputs should reproduce the same diff we just wrote.
    assert_eq!(engine.get_inputs(0), Inputs::new(7, 0, 0));
    assert_eq!(engine.get_inputs(1), Inputs::new(3, 0, 0));
}

#[test]
fn load_restores_prior_accumulator_value() {
    let mut engine = engine();
    engine.advance_frame_write(Inputs::new(10, 0, 0));
    let after_first = engine.resource().borrow().accumulator();
    engine.save().unwrap();
    engine.advance_frame_write(Inputs::new(10, 0, 0));
    assert_ne!(engine.resource().borrow().accumulator(), after_first);

    engine.load(1).unwrap();
    assert_eq!(engine.current_frame(), 1);
    assert_eq!(engine.resource().borrow().accumulator(), after_first);
}

#[test]
fn rollback_discards_everything_from_the_target_frame_onward() {
    let mut engine = engine();
    engine.advance_frame_write(Inputs::new(1, 0, 0));
    engine.advance_frame_write(Inputs::new(2, 0, 0));
    engine.advance_frame_write(Inputs::new(3, 0, 0));

    engine.rollback(1).unwrap();

    assert_eq!(engine.current_frame(), 1);
    assert_eq!(engine.get_inputs(0), Inputs::new(1, 0, 0));
    // Frame 1 onward reverted to the base track default (no input).
    assert_eq!(engine.get_inputs(1), Inputs::default());
}

#[test]
fn modify_adhoc_commits_diff_on_success() {
    let mut engine = engine();
    let status = engine
        .modify_adhoc(|engine| {
            engine.advance_frame_write(Inputs::new(5, 0, 0));
            Ok(true)
        })
        .unwrap();

    assert!(status.asserted);
    assert_eq!(engine.get_inputs(0), Inputs::new(5, 0, 0));
    assert!(!engine.is_diff_empty());
}

#[test]
fn modify_adhoc_reverts_diff_on_failure() {
    let mut engine = engine();
    let start_frame = engine.current_frame();
    let status = engine
        .modify_adhoc(|engine| {
            engine.advance_frame_write(Inputs::new(9, 0, 0));
            Ok(false)
        })
        .unwrap();

    assert!(!status.asserted);
    assert_eq!(engine.current_frame(), start_frame);
    assert!(engine.is_diff_empty());
}

#[test]
fn execute_adhoc_never_commits_even_on_success() {
    let mut engine = engine();
    let start_frame = engine.current_frame();
    let status = engine
        .execute_adhoc(|engine| {
            engine.advance_frame_write(Inputs::new(4, 0, 0));
            Ok(true)
        })
        .unwrap();

    assert!(status.asserted);
    assert_eq!(engine.current_frame(), start_frame);
    assert!(engine.is_diff_empty());
}

#[test]
fn test_adhoc_reports_empty_diff_even_though_it_commits_nothing_either() {
    let mut engine = engine();
    let status = engine
        .test_adhoc(|engine| {
            engine.advance_frame_write(Inputs::new(1, 0, 0));
            Ok(true)
        })
        .unwrap();

    assert!(status.diff.is_empty());
}

#[test]
fn run_skips_execution_when_validation_fails() {
    let mut engine = engine();
    let status = engine
        .run(
            |_| Ok(false),
            |engine| {
                engine.advance_frame_write(Inputs::new(99, 0, 0));
                Ok(true)
            },
            |_| Ok(true),
        )
        .unwrap();

    assert!(!status.validated);
    assert!(!status.executed);
    assert!(engine.is_diff_empty());
}

#[test]
fn run_commits_execution_diff_when_all_three_phases_pass() {
    let mut engine = engine();
    let status = engine
        .run(
            |_| Ok(true),
            |engine| {
                engine.advance_frame_write(Inputs::new(6, 0, 0));
                Ok(true)
            },
            |_| Ok(true),
        )
        .unwrap();

    assert!(status.validated);
    assert!(status.executed);
    assert!(status.asserted);
    assert_eq!(engine.get_inputs(0), Inputs::new(6, 0, 0));
}

#[test]
fn export_track_matches_what_was_applied() {
    let mut engine = engine();
    engine.advance_frame_write(Inputs::new(1, 0, 0));
    engine.advance_frame_write(Inputs::new(2, 0, 0));
    engine.advance_frame_write(Inputs::new(3, 0, 0));

    let track = engine.export_track(3);
    assert_eq!(track.get(0), Inputs::new(1, 0, 0));
    assert_eq!(track.get(1), Inputs::new(2, 0, 0));
    assert_eq!(track.get(2), Inputs::new(3, 0, 0));
}
