//! Engine facade.
//!
//! Wires the device classifier, animation resolver, shared watcher pool,
//! image loader and diagnostic sampler together behind one entry point, so a
//! host constructs a single [`Engine`] instead of threading five components
//! through its presentation layer.

use std::rc::Rc;

use vantage_core::{
    HostCapabilities, ImageFetcher, IntersectionHost, MemoryProbe, RuntimeHandle, TargetId,
};

use crate::animation::{self, AnimationConfig};
use crate::device::{classify, DeviceTier};
use crate::image::{ImageHandle, ImageLoader, ImageOptions};
use crate::observer::ObserverPool;
use crate::sampler::RuntimeSampler;
use crate::visibility::{watch_visibility, VisibilityHandle, VisibilityOptions};

pub struct Engine {
    runtime: RuntimeHandle,
    capabilities: HostCapabilities,
    tier: DeviceTier,
    config: AnimationConfig,
    pool: ObserverPool,
    fetcher: Rc<dyn ImageFetcher>,
    sampler: RuntimeSampler,
}

impl Engine {
    pub fn new(
        runtime: RuntimeHandle,
        capabilities: HostCapabilities,
        intersection: Rc<dyn IntersectionHost>,
        fetcher: Rc<dyn ImageFetcher>,
        memory: Option<Rc<dyn MemoryProbe>>,
    ) -> Self {
        let tier = classify(&capabilities);
        let config = animation::resolve(tier, capabilities.prefers_reduced_motion);
        log::info!("engine initialized: tier {tier:?}");
        let pool = ObserverPool::new(runtime.clone(), intersection);
        let sampler = RuntimeSampler::new(runtime.clone(), memory);
        Self {
            runtime,
            capabilities,
            tier,
            config,
            pool,
            fetcher,
            sampler,
        }
    }

    pub fn tier(&self) -> DeviceTier {
        self.tier
    }

    pub fn config(&self) -> AnimationConfig {
        self.config
    }

    /// The shared watcher pool. Clones are cheap and refer to the same pool.
    pub fn pool(&self) -> ObserverPool {
        self.pool.clone()
    }

    pub fn sampler(&self) -> &RuntimeSampler {
        &self.sampler
    }

    pub fn watch_visibility(
        &self,
        target: TargetId,
        options: VisibilityOptions,
    ) -> VisibilityHandle {
        watch_visibility(&self.pool, target, options)
    }

    pub fn load_image(
        &self,
        target: TargetId,
        source: &str,
        options: ImageOptions,
    ) -> ImageHandle {
        self.image_loader().load(target, source, options)
    }

    pub fn image_loader(&self) -> ImageLoader {
        ImageLoader::new(
            self.runtime.clone(),
            self.pool.clone(),
            Rc::clone(&self.fetcher),
            self.config,
        )
    }

    /// Re-derives the tier and configuration from fresh capabilities, for
    /// example after the network grade changes. The previous configuration
    /// value is replaced wholesale, never mutated in place.
    pub fn update_capabilities(&mut self, capabilities: HostCapabilities) {
        let tier = classify(&capabilities);
        if tier != self.tier {
            log::info!("device tier changed: {:?} -> {tier:?}", self.tier);
        }
        self.capabilities = capabilities;
        self.tier = tier;
        self.config = animation::resolve(tier, self.capabilities.prefers_reduced_motion);
    }
}
