//! Message-improvement pipeline.
//!
//! Improvement is best-effort enhancement, never a gate: a missing or failing
//! improver always falls back to the original text.

pub mod improver;
pub mod registry;

pub use improver::{FnImprover, GenerativeImprover, Improver};
pub use registry::ImproverRegistry;
