//! Creator Scout Runtime
//!
//! Batch coordinator tying the core evaluators, the creator graph and the
//! safety gate together.

pub mod pipeline;
pub mod source;

pub use pipeline::*;
pub use source::*;
