//! Detection engine (spec §4.L): rule loading, content-signature scanning,
//! anomaly scoring, and the deterministic evaluation order that ties them
//! together.

pub mod anomaly;
pub mod engine;
pub mod rule_loader;
pub mod signature;

pub use engine::DetectionEngine;
