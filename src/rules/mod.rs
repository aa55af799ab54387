//! Threshold rules grouped by technology.
//!
//! The store is plain owned data. The engine works on an `Arc` snapshot of
//! it, so edits only become visible to runs started after they are applied.

pub mod defaults;
pub mod store;

pub use store::{parse_rule_ref, parse_rule_replacement, parse_rule_spec, RuleStore};
