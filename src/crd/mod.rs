//! Custom Resource Definitions the harness creates
//!
//! - [`MayastorPool`]: per-node storage pool

pub mod pool;

pub use pool::{MayastorPool, MayastorPoolSpec, MayastorPoolStatus, PoolState};
