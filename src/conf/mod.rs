//! Configuration-record tooling shared by the per-protocol config editors

pub mod diff;

pub use diff::*;
