//! Core runtime services for the Vantage adaptive rendering engine.
//!
//! This crate holds everything the engine components share: the
//! single-threaded virtual-clock [`Runtime`], cancellation-safe scheduling
//! guards, small observable state cells, and the host capability model
//! (intersection observation, image fetching, memory introspection).

mod host;
mod runtime;
mod state;

pub use host::{
    EffectiveConnection, HostCapabilities, ImageFetchError, ImageFetcher, IntersectionEntry,
    IntersectionHost, IntersectionWatcher, MemoryProbe, MemorySample, RootMargin, TargetId,
    WatcherOptions,
};
pub use runtime::{FrameCallbackId, FrameRequest, Runtime, RuntimeHandle, TimerGuard, TimerId};
pub use state::{MutableState, State};
