//! The hierarchical script engine (§4.4): ad-hoc level stack, state-owner resolution,
//! and the save/load machinery built on top of [`scatter_resource`].
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub use engine::{ScriptEngine, DEFAULT_INPUT_SYMBOL};
pub use level::LevelStatus;
pub use metadata::{CachedSave, InputsMetadata};

mod engine;
mod level;
mod metadata;

#[cfg(test)]
mod tests;
