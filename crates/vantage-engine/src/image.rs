// Copyright 2025 The Vantage Authors
// SPDX-License-Identifier: Apache-2.0

//! Progressive image loading.
//!
//! Each image advances through a strictly forward state machine:
//! `Pending → InView → Loading → Loaded | Error`. Entry into view is gated
//! by a one-shot visibility trigger (skipped entirely for prioritized
//! images, which jump straight to `Loading`). The placeholder URL stays
//! displayable the whole time; on success the full image crossfades in over
//! the resolved animation duration, on failure the state parks in the
//! terminal `Error` with no retry. Dropping the handle mid-flight
//! neutralizes the fetch completion so no state changes afterwards.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use vantage_core::{
    ImageFetchError, ImageFetcher, MutableState, RuntimeHandle, State, TargetId, TimerGuard,
};

use crate::animation::AnimationConfig;
use crate::image_url::{low_fidelity_url, neutral_placeholder, quality_url, ImageQuality};
use crate::observer::ObserverPool;
use crate::visibility::{watch_visibility_with, VisibilityHandle, VisibilityOptions};

/// Lifecycle of one progressive image. Transitions are strictly forward;
/// `Loaded` and `Error` are terminal. `InView` is skipped when the image is
/// priority-loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageLoadState {
    Pending,
    InView,
    Loading,
    Loaded,
    Error,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImageOptions {
    pub quality: ImageQuality,
    /// Explicit placeholder URL; wins over the generated variants.
    pub placeholder: Option<String>,
    pub enable_blur: bool,
    /// Load eagerly instead of waiting for viewport entry.
    pub priority: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub threshold: f32,
    /// Defers the `Loaded` transition after fetch completion, collapsing
    /// bursts of completion events into one notification. Zero disables it.
    pub settle_debounce: Duration,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            quality: ImageQuality::Medium,
            placeholder: None,
            enable_blur: true,
            priority: false,
            width: None,
            height: None,
            threshold: 0.1,
            settle_debounce: Duration::ZERO,
        }
    }
}

struct ImageInner {
    runtime: RuntimeHandle,
    fetcher: Rc<dyn ImageFetcher>,
    config: AnimationConfig,
    state: MutableState<ImageLoadState>,
    resolved_url: String,
    placeholder_url: String,
    enable_blur: bool,
    settle_debounce: Duration,
    settle_timer: Option<TimerGuard>,
    loaded_at: Option<Duration>,
    alive: Rc<Cell<bool>>,
    visibility: Option<VisibilityHandle>,
}

/// Orchestrates progressive loading against a pool, a fetcher and the
/// resolved animation configuration.
pub struct ImageLoader {
    runtime: RuntimeHandle,
    pool: ObserverPool,
    fetcher: Rc<dyn ImageFetcher>,
    config: AnimationConfig,
}

impl ImageLoader {
    pub fn new(
        runtime: RuntimeHandle,
        pool: ObserverPool,
        fetcher: Rc<dyn ImageFetcher>,
        config: AnimationConfig,
    ) -> Self {
        Self {
            runtime,
            pool,
            fetcher,
            config,
        }
    }

    /// Begins loading `source` for the element identified by `target`.
    pub fn load(&self, target: TargetId, source: &str, options: ImageOptions) -> ImageHandle {
        let resolved_url = quality_url(source, options.quality);
        let placeholder_url = options
            .placeholder
            .clone()
            .or_else(|| low_fidelity_url(source))
            .unwrap_or_else(|| neutral_placeholder(options.width, options.height));

        let inner = Rc::new(RefCell::new(ImageInner {
            runtime: self.runtime.clone(),
            fetcher: Rc::clone(&self.fetcher),
            config: self.config,
            state: MutableState::new(ImageLoadState::Pending),
            resolved_url,
            placeholder_url,
            enable_blur: options.enable_blur,
            settle_debounce: options.settle_debounce,
            settle_timer: None,
            loaded_at: None,
            alive: Rc::new(Cell::new(true)),
            visibility: None,
        }));

        if options.priority {
            // Prioritized images skip the InView gate entirely.
            Self::begin_fetch(&inner);
        } else {
            let weak = Rc::downgrade(&inner);
            let visibility = watch_visibility_with(
                &self.pool,
                target,
                VisibilityOptions {
                    threshold: options.threshold,
                    once: true,
                    ..VisibilityOptions::default()
                },
                move |visible| {
                    if !visible {
                        return;
                    }
                    let Some(inner) = weak.upgrade() else {
                        return;
                    };
                    {
                        let inner = inner.borrow();
                        if inner.state.get() != ImageLoadState::Pending {
                            return;
                        }
                        inner.state.set_value(ImageLoadState::InView);
                    }
                    Self::begin_fetch(&inner);
                },
            );
            inner.borrow_mut().visibility = Some(visibility);
        }

        ImageHandle { inner }
    }

    /// Eagerly warms a batch of URLs. `on_done` fires once: with the first
    /// failure, or with `Ok` after every fetch succeeded.
    pub fn preload(
        &self,
        urls: &[&str],
        on_done: impl FnOnce(Result<(), ImageFetchError>) + 'static,
    ) {
        if urls.is_empty() {
            on_done(Ok(()));
            return;
        }
        let remaining = Rc::new(Cell::new(urls.len()));
        type DoneCallback = Box<dyn FnOnce(Result<(), ImageFetchError>)>;
        let done: Rc<RefCell<Option<DoneCallback>>> =
            Rc::new(RefCell::new(Some(Box::new(on_done))));
        for url in urls {
            let remaining = Rc::clone(&remaining);
            let done = Rc::clone(&done);
            self.fetcher.fetch(
                url,
                Box::new(move |result| match result {
                    Ok(()) => {
                        remaining.set(remaining.get() - 1);
                        if remaining.get() == 0 {
                            if let Some(on_done) = done.borrow_mut().take() {
                                on_done(Ok(()));
                            }
                        }
                    }
                    Err(error) => {
                        if let Some(on_done) = done.borrow_mut().take() {
                            on_done(Err(error));
                        }
                    }
                }),
            );
        }
    }

    fn begin_fetch(inner: &Rc<RefCell<ImageInner>>) {
        let (fetcher, url, alive) = {
            let inner = inner.borrow();
            match inner.state.get() {
                ImageLoadState::Pending | ImageLoadState::InView => {}
                _ => return,
            }
            inner.state.set_value(ImageLoadState::Loading);
            (
                Rc::clone(&inner.fetcher),
                inner.resolved_url.clone(),
                Rc::clone(&inner.alive),
            )
        };

        let weak = Rc::downgrade(inner);
        fetcher.fetch(
            &url,
            Box::new(move |result| {
                if !alive.get() {
                    // Owner discarded the image while the fetch was in
                    // flight; the completion must not mutate anything.
                    return;
                }
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                match result {
                    Ok(()) => Self::settle_loaded(&inner),
                    Err(error) => {
                        log::debug!("image fetch failed, entering terminal error state: {error}");
                        let inner = inner.borrow();
                        if inner.state.get() == ImageLoadState::Loading {
                            inner.state.set_value(ImageLoadState::Error);
                        }
                    }
                }
            }),
        );
    }

    fn settle_loaded(inner: &Rc<RefCell<ImageInner>>) {
        let debounce = inner.borrow().settle_debounce;
        if debounce.is_zero() {
            Self::mark_loaded(inner);
            return;
        }
        let runtime = inner.borrow().runtime.clone();
        let weak = Rc::downgrade(inner);
        let guard = TimerGuard::schedule(&runtime, debounce, move || {
            if let Some(inner) = weak.upgrade() {
                Self::mark_loaded(&inner);
            }
        });
        inner.borrow_mut().settle_timer = Some(guard);
    }

    fn mark_loaded(inner: &Rc<RefCell<ImageInner>>) {
        let mut inner = inner.borrow_mut();
        if inner.state.get() != ImageLoadState::Loading {
            return;
        }
        inner.loaded_at = Some(inner.runtime.now());
        inner.settle_timer = None;
        inner.state.set_value(ImageLoadState::Loaded);
    }
}

/// Owner-side handle for one progressive image.
pub struct ImageHandle {
    inner: Rc<RefCell<ImageInner>>,
}

impl ImageHandle {
    pub fn state(&self) -> ImageLoadState {
        self.inner.borrow().state.get()
    }

    /// Pollable view of the load state; stays readable after the handle is
    /// dropped.
    pub fn state_cell(&self) -> State<ImageLoadState> {
        self.inner.borrow().state.as_state()
    }

    /// URL resolved for the requested quality tier.
    pub fn resolved_url(&self) -> String {
        self.inner.borrow().resolved_url.clone()
    }

    /// Placeholder to display until the crossfade completes.
    pub fn placeholder_url(&self) -> String {
        self.inner.borrow().placeholder_url.clone()
    }

    /// Crossfade opacity of the full image at the current time: zero until
    /// loaded, then eased to one over the animation duration (immediately
    /// one under reduced motion).
    pub fn opacity(&self) -> f32 {
        let inner = self.inner.borrow();
        match (inner.state.get(), inner.loaded_at) {
            (ImageLoadState::Loaded, Some(loaded_at)) => {
                let elapsed = inner.runtime.now().saturating_sub(loaded_at);
                inner.config.fade_opacity(elapsed)
            }
            _ => 0.0,
        }
    }

    /// Whether the blur-up treatment is still applied to the placeholder.
    pub fn blur_active(&self) -> bool {
        let inner = self.inner.borrow();
        inner.enable_blur
            && !matches!(
                inner.state.get(),
                ImageLoadState::Loaded | ImageLoadState::Error
            )
    }
}

impl Drop for ImageHandle {
    fn drop(&mut self) {
        // Neutralize before the visibility handle drops so nothing scheduled
        // can still reach this image.
        let visibility = {
            let mut inner = self.inner.borrow_mut();
            inner.alive.set(false);
            inner.settle_timer = None;
            inner.visibility.take()
        };
        drop(visibility);
    }
}
