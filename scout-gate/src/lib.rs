//! Creator Scout Gate - admission control for outward actions
//!
//! Every DM, comment or export passes through [`SafetyGate::authorize`]
//! before anything leaves the system. The gate consults, in order:
//! - the kill switch (blocks everything, immediately)
//! - the action mode (review holds, manual exports, live may authorize)
//! - rolling rate-limit windows (checked and consumed in one step)

pub mod gate;
pub mod limiter;
pub mod request;

pub use gate::*;
pub use limiter::*;
pub use request::*;
