//! Host capability model.
//!
//! The original system probed its host ad hoc at every call site. Here the
//! embedding host resolves what it can offer exactly once, into
//! [`HostCapabilities`] plus a handful of narrow trait objects, and passes
//! those into the components that need them. A capability the host cannot
//! provide is `None`; components degrade to their documented neutral default
//! and never treat absence as an error.

use std::rc::Rc;

use thiserror::Error;

/// Coarse effective network classification, mirroring the signal most
/// browser-era hosts expose ("slow-2g" / "2g" / "3g" / "4g").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectiveConnection {
    Slow2g,
    Cell2g,
    Cell3g,
    Cell4g,
}

/// Capability signals resolved once at startup.
///
/// Every probe is optional. Defaults are applied by the consumers (the tier
/// classifier assumes a mid-range device), not here, so the descriptor
/// faithfully records what the host actually knew.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HostCapabilities {
    pub hardware_concurrency: Option<u32>,
    pub device_memory_gb: Option<f32>,
    pub network: Option<EffectiveConnection>,
    pub prefers_reduced_motion: bool,
}

/// Opaque identity of an observed element. The presentation layer owns the
/// mapping from real elements to ids; the engine only compares them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetId(pub u64);

/// Margins applied to the viewport before intersection is computed, in
/// pixels. Negative values shrink the effective viewport on that edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RootMargin {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl RootMargin {
    /// Shrinks the viewport from the bottom by `px`, so elements only count
    /// as visible once they are comfortably inside it.
    pub fn bottom_inset(px: i32) -> Self {
        Self {
            bottom: -px,
            ..Self::default()
        }
    }
}

/// Geometry parameters for one shared watcher.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WatcherOptions {
    pub threshold: f32,
    pub root_margin: RootMargin,
}

/// One element's intersection change within a batch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntersectionEntry {
    pub target: TargetId,
    pub is_intersecting: bool,
}

/// A live viewport-intersection watcher created by the host.
///
/// Implementations must not re-enter the observer pool synchronously from
/// `observe`/`unobserve`; batches are delivered through the `on_batch`
/// callback passed at creation.
pub trait IntersectionWatcher {
    fn observe(&mut self, target: TargetId);
    fn unobserve(&mut self, target: TargetId);
}

/// Factory for shared watchers. Returning `None` signals that the host has
/// no intersection-observation capability at all; the pool then fails open.
pub trait IntersectionHost {
    fn create_watcher(
        &self,
        options: WatcherOptions,
        on_batch: Rc<dyn Fn(&[IntersectionEntry])>,
    ) -> Option<Box<dyn IntersectionWatcher>>;
}

/// Why an image fetch failed. Terminal either way; the engine defines no
/// retry or backoff policy.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ImageFetchError {
    #[error("image request failed: {0}")]
    Network(String),
    #[error("image data could not be decoded")]
    Decode,
}

/// Asynchronous image fetch, completion delivered back on the engine's
/// runtime. A fetch either succeeds, fails, or stays pending forever if the
/// host never settles it; the engine imposes no timeout of its own.
pub trait ImageFetcher {
    fn fetch(&self, url: &str, on_done: Box<dyn FnOnce(Result<(), ImageFetchError>)>);
}

/// Heap usage snapshot in megabytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemorySample {
    pub used_mb: u32,
    pub total_mb: u32,
}

/// Optional memory introspection. `None` means the metric is omitted from
/// diagnostics output, not that sampling failed.
pub trait MemoryProbe {
    fn sample(&self) -> Option<MemorySample>;
}
