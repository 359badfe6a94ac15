//! Per-element visibility triggers.
//!
//! A thin wrapper over [`ObserverPool::register`] producing a pollable
//! boolean. The default configuration matches the presentation layer's
//! scroll-reveal behavior: 10% threshold, a 50 px bottom inset, one-shot.

use std::time::Duration;

use vantage_core::{MutableState, RootMargin, State, TargetId};

use crate::observer::{ObserveOptions, ObserverPool, PoolRegistration};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisibilityOptions {
    pub threshold: f32,
    pub root_margin: RootMargin,
    /// Auto-unregister after the first visible transition.
    pub once: bool,
    pub delay: Duration,
}

impl Default for VisibilityOptions {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            root_margin: RootMargin::bottom_inset(50),
            once: true,
            delay: Duration::ZERO,
        }
    }
}

/// Owner-side handle for one visibility subscription.
///
/// Dropping the handle (or calling [`dismiss`](VisibilityHandle::dismiss))
/// tears the subscription down exactly once, synchronously; no callback runs
/// afterwards even if an activation timer was in flight.
pub struct VisibilityHandle {
    is_visible: MutableState<bool>,
    registration: Option<PoolRegistration>,
}

impl VisibilityHandle {
    pub fn is_visible(&self) -> bool {
        self.is_visible.get()
    }

    /// Pollable view that stays readable after the handle is gone.
    pub fn state(&self) -> State<bool> {
        self.is_visible.as_state()
    }

    pub fn dismiss(&mut self) {
        if let Some(mut registration) = self.registration.take() {
            registration.unregister();
        }
    }
}

impl Drop for VisibilityHandle {
    fn drop(&mut self) {
        self.dismiss();
    }
}

/// Subscribes `target` and returns a handle whose boolean flips on
/// visibility transitions.
pub fn watch_visibility(
    pool: &ObserverPool,
    target: TargetId,
    options: VisibilityOptions,
) -> VisibilityHandle {
    watch_visibility_with(pool, target, options, |_| {})
}

/// Like [`watch_visibility`], with a hook invoked on every transition. The
/// image loader uses the hook to gate its lazy fetch.
pub fn watch_visibility_with(
    pool: &ObserverPool,
    target: TargetId,
    options: VisibilityOptions,
    mut on_change: impl FnMut(bool) + 'static,
) -> VisibilityHandle {
    let is_visible = MutableState::new(false);
    let cell = is_visible.clone();
    let registration = pool.register(
        target,
        ObserveOptions {
            threshold: options.threshold,
            root_margin: options.root_margin,
            trigger_once: options.once,
            delay: options.delay,
        },
        move |visible| {
            cell.set_value(visible);
            on_change(visible);
        },
    );
    VisibilityHandle {
        is_visible,
        registration: Some(registration),
    }
}
