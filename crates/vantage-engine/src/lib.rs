// Copyright 2025 The Vantage Authors
// SPDX-License-Identifier: Apache-2.0

//! Adaptive rendering and viewport-scheduling engine.
//!
//! Classifies the client device into a performance tier, resolves an
//! animation/quality configuration from it, and schedules rendering work
//! around viewport visibility: a shared intersection-watcher pool,
//! progressive image loading, list windowing, call-rate shaping and a
//! diagnostic frame/memory sampler. All timing runs against the
//! deterministic virtual clock in `vantage-core`, so every behavior here is
//! testable without a display or a wall clock.

mod animation;
mod device;
mod engine;
mod image;
mod image_url;
mod observer;
mod rate_limit;
mod sampler;
mod scroller;
mod visibility;

pub use animation::{resolve as resolve_animation_config, AnimationConfig, Easing};
pub use device::{classify, DeviceTier};
pub use engine::Engine;
pub use image::{ImageHandle, ImageLoadState, ImageLoader, ImageOptions};
pub use image_url::{
    low_fidelity_url, neutral_placeholder, quality_url, supports_transforms, ImageQuality,
};
pub use observer::{ObserveOptions, ObserverPool, PoolRegistration};
pub use rate_limit::{Debounced, FrameThrottled, Throttled};
pub use sampler::{FrameStats, RuntimeSampler, SamplerEvent};
pub use scroller::{VirtualScroller, VirtualWindow};
pub use visibility::{
    watch_visibility, watch_visibility_with, VisibilityHandle, VisibilityOptions,
};
