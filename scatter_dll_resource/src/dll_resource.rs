use std::{collections::HashMap, fmt, mem, time::Instant};

use dlopen::raw::AddressInfoObtainer;
use scatter_resource::{CostModel, Frame, Resource};
use tracing::{debug, info};
use wafel_layout::read_dll_segments;

use crate::{unique_library::UniqueLibrary, DllResourceError};

/// The symbol a simulator binary must export to run its one-time setup.
pub const INIT_SYMBOL: &str = "tas_init";
/// The symbol a simulator binary must export to advance one frame.
pub const ADVANCE_SYMBOL: &str = "tas_advance";

#[derive(Clone, Copy)]
struct Segment {
    offset: usize,
    size: usize,
}

/// A [`Resource`] backed by a simulator shared library (`.dll`/`.so`/`.dylib`), loaded
/// through the host's dynamic linker.
///
/// Savestates are taken by copying the binary's `.data` and `.bss` segments out of its
/// live memory image; `load` copies them back. This mirrors how a debugger-driven
/// savestate tool snapshots a running process without cooperation from the binary
/// itself, and means the ABI a simulator binary must expose is just two symbols:
/// [`INIT_SYMBOL`] and [`ADVANCE_SYMBOL`].
pub struct DllResource {
    library: UniqueLibrary,
    base: *mut u8,
    segments: Vec<Segment>,
    advance_fn: unsafe extern "C" fn(),
    frame: Frame,
    next_slot_id: u64,
    slots: HashMap<u64, Vec<Vec<u8>>>,
    cost_model: CostModel,
}

// The segments are only ever touched through `&mut self`, so accesses are sequenced by
// Rust's borrow rules; the raw pointer itself carries no thread affinity.
unsafe impl Send for DllResource {}

impl fmt::Debug for DllResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DllResource")
            .field("frame", &self.frame)
            .field("live_slots", &self.slots.len())
            .finish_non_exhaustive()
    }
}

impl DllResource {
    /// Load a simulator binary from `path`.
    ///
    /// If the same path has already been loaded elsewhere in this process (as will
    /// happen when each worker thread loads its own copy of the same binary), the
    /// binary is first copied to a private temp file so that its global/static memory
    /// is independent from any other open of the same path.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, DllResourceError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading simulator binary");
        let library = UniqueLibrary::open(path)?;

        let init: *const () = read_symbol(&library, INIT_SYMBOL)
            .ok_or_else(|| DllResourceError::UndefinedSymbol(INIT_SYMBOL.to_string()))?;
        let addr_info = AddressInfoObtainer::new().obtain(init)?;
        let base = addr_info.dll_base_addr as *mut u8;

        let segment_table = read_dll_segments(path)?;
        let mut segments: Vec<Segment> = segment_table
            .iter()
            .filter(|s| s.name == ".data" || s.name == ".bss")
            .map(|s| Segment {
                offset: s.virtual_address as usize,
                size: s.virtual_size as usize,
            })
            .collect();
        if segments.is_empty() {
            return Err(DllResourceError::MissingDataSegments);
        }
        segments.sort_by_key(|s| s.offset);

        unsafe {
            let init_fn: unsafe extern "C" fn() = mem::transmute(init);
            init_fn();
        }

        let advance: *const () = read_symbol(&library, ADVANCE_SYMBOL)
            .ok_or_else(|| DllResourceError::UndefinedSymbol(ADVANCE_SYMBOL.to_string()))?;
        let advance_fn: unsafe extern "C" fn() = unsafe { mem::transmute(advance) };

        info!(path = %path.display(), segments = segments.len(), "simulator binary loaded");

        Ok(Self {
            library,
            base,
            segments,
            advance_fn,
            frame: 0,
            next_slot_id: 1,
            slots: HashMap::new(),
            cost_model: CostModel::default(),
        })
    }

    fn snapshot_segments(&self) -> Vec<Vec<u8>> {
        self.segments
            .iter()
            .map(|segment| unsafe {
                std::slice::from_raw_parts(self.base.add(segment.offset), segment.size).to_vec()
            })
            .collect()
    }

    fn restore_segments(&mut self, saved: &[Vec<u8>]) {
        for (segment, bytes) in self.segments.iter().zip(saved) {
            unsafe {
                let dst = std::slice::from_raw_parts_mut(self.base.add(segment.offset), segment.size);
                dst.copy_from_slice(bytes);
            }
        }
    }
}

impl Resource for DllResource {
    type SlotId = u64;
    type Error = DllResourceError;

    fn advance(&mut self) {
        let start = Instant::now();
        unsafe {
            (self.advance_fn)();
        }
        self.cost_model.record_advance(start.elapsed());
        self.frame += 1;
    }

    fn save(&mut self) -> Result<Self::SlotId, Self::Error> {
        let start = Instant::now();
        let id = self.next_slot_id;
        self.next_slot_id += 1;
        self.slots.insert(id, self.snapshot_segments());
        self.cost_model.record_save(start.elapsed());
        debug!(id, frame = self.frame, "saved slot");
        Ok(id)
    }

    fn load(&mut self, id: Self::SlotId) -> Result<(), Self::Error> {
        let start = Instant::now();
        let saved = self
            .slots
            .get(&id)
            .unwrap_or_else(|| panic!("unknown slot id {id}"))
            .clone();
        self.restore_segments(&saved);
        self.cost_model.record_load(start.elapsed());
        debug!(id, frame = self.frame, "loaded slot");
        Ok(())
    }

    fn erase(&mut self, id: Self::SlotId) {
        self.slots.remove(&id);
        debug!(id, "erased slot");
    }

    fn current_frame(&self) -> Frame {
        self.frame
    }

    fn addr(&self, symbol: &str) -> *mut u8 {
        read_symbol::<u8>(&self.library, symbol)
            .unwrap_or_else(|| panic!("undefined symbol: {symbol}")) as *mut u8
    }

    fn should_save(&self, est_future_advances: u64) -> bool {
        self.cost_model.should_save(est_future_advances)
    }

    fn should_load(&self, frame_delta: u64) -> bool {
        self.cost_model.should_load(frame_delta)
    }
}

fn read_symbol<T>(library: &UniqueLibrary, name: &str) -> Option<*const T> {
    unsafe { library.symbol(name) }.ok()
}
