//! Reads the segment table out of a simulator binary.
//!
//! This is the slice of the original layout-reading crate that
//! [`scatter_dll_resource`] still needs: finding the `.data`/`.bss` segments a
//! [`DllResource`](https://docs.rs/scatter_dll_resource) snapshots for save states.
//! DWARF-derived variable/type layouts (reading game state by field name) are outside
//! this core's scope — the [`Resource`](https://docs.rs/scatter_resource) contract
//! only ever resolves a symbol to a raw pointer.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub use dll_layout::*;
pub use error::*;

mod dll_layout;
mod error;
