//! A [`scatter_resource::Resource`] implementation backed by simulator binaries loaded
//! through the system dynamic linker.
#![warn(missing_debug_implementations, rust_2018_idioms)]

pub use dll_resource::{DllResource, ADVANCE_SYMBOL, INIT_SYMBOL};
pub use error::DllResourceError;

mod dll_resource;
mod error;
mod unique_library;
