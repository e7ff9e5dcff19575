//! Domain layer - Core types and port definitions
//!
//! This module defines the traits (ports) that adapters implement and the
//! model the install flow passes between its stages.

pub mod model;
pub mod ports;

pub use model::*;
pub use ports::*;
