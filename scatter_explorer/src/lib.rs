//! The parallel state-space explorer ("scattershot", §4.5): worker threads replay and
//! mutate trajectories driven by [`scatter_script::ScriptEngine`], periodically merging
//! their discoveries into a shared, bin-deduplicated pool.
#![warn(missing_debug_implementations, rust_2018_idioms)]

pub use block::Block;
pub use config::{ConfigError, Configuration};
pub use explorer::{run, ExplorerError, ExplorerResult};
pub use hash::hash_bin;
pub use policy::{Bin, Policy};
pub use pool::{Pool, UpsertOutcome};
pub use segment::Segment;
pub use shared::Shared;

mod block;
mod config;
mod coordination;
mod explorer;
mod gc;
mod hash;
mod policy;
mod pool;
mod segment;
mod shared;
mod worker;
