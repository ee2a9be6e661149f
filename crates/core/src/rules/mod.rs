//! Declarative rule IR for the detection engine (spec §4.L, §9 design note).
//!
//! Rules are parsed once at load time into this typed tree instead of being
//! re-interpreted against every event; `crates/processor` owns the loader
//! and the event-by-event walk.

pub mod condition;
pub mod ir;
pub mod rule;

pub use condition::{CombineOp, ConditionClause, ConditionOp, ConditionRule};
pub use ir::{Clause, Matcher, Node, Selection, SelectionMatch};
pub use rule::{Detection, Rule};
