//! Structural information extracted from a simulator binary.

use std::{fmt, fs, path::Path};

use object::{Object, ObjectSegment};
use serde::{Deserialize, Serialize};

use crate::DllLayoutError;

/// A segment defined in the binary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DllSegment {
    /// The name of the segment.
    pub name: String,
    /// The virtual address that the segment is loaded to.
    ///
    /// This is the offset from the loaded binary's base address.
    pub virtual_address: u64,
    /// The size that the segment has when loaded into memory.
    pub virtual_size: u64,
}

impl fmt::Display for DllSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: vaddr={:#X}, size={:#X}",
            self.name, self.virtual_address, self.virtual_size
        )
    }
}

/// Load segment definitions from a binary (used by [`scatter_dll_resource`] to find
/// the `.data`/`.bss` segments a savestate snapshots).
///
/// [`scatter_dll_resource`]: https://docs.rs/scatter_dll_resource
pub fn read_dll_segments(dll_path: impl AsRef<Path>) -> Result<Vec<DllSegment>, DllLayoutError> {
    let buffer = fs::read(&dll_path)?;
    let object = object::File::parse(&buffer[..])?;
    read_dll_segments_impl(&object)
}

fn read_dll_segments_impl(object: &object::File<'_>) -> Result<Vec<DllSegment>, DllLayoutError> {
    let mut segments = Vec::new();
    for segment in object.segments() {
        if let Some(name) = segment.name()? {
            segments.push(DllSegment {
                name: name.to_owned(),
                virtual_address: segment.address() - object.relative_address_base(),
                virtual_size: segment.size(),
            });
        }
    }
    Ok(segments)
}
