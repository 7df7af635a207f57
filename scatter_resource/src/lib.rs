//! The simulator contract (§4.1) and slot ownership machinery (§4.2) the script
//! engine and explorer are built on top of.
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub use cost_model::CostModel;
pub use slots::{SlotHandle, SlotManager};
pub use traits::Resource;

mod cost_model;
mod slots;
mod traits;

/// A non-negative frame index. Re-exported so downstream crates don't need to depend
/// on `scatter_inputs` just for this alias.
pub type Frame = u64;
