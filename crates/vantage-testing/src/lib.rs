//! Deterministic host doubles for exercising the engine.
//!
//! The real engine runs against whatever intersection, fetch and memory
//! facilities the embedding host provides. These doubles make every one of
//! those hosts scriptable: tests move targets in and out of view, settle
//! image fetches by hand, and drive time through the virtual-clock runtime.

mod fetcher;
mod intersection;
mod memory;

pub use fetcher::ScriptedFetcher;
pub use intersection::{AbsentIntersectionHost, ScriptedIntersectionHost};
pub use memory::FixedMemoryProbe;
