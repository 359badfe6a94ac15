// Copyright 2025 The Vantage Authors
// SPDX-License-Identifier: Apache-2.0

//! Shared viewport-intersection watcher pool.
//!
//! Many elements subscribe to visibility with the same observation
//! parameters. Instead of one host watcher per element, the pool keys
//! watchers by `(threshold, root margin, trigger-once)` and multiplexes all
//! registrations for a key onto a single shared watcher, dispatching batches
//! through a per-watcher side table. At most one underlying watcher exists
//! per distinct key for the pool's lifetime.
//!
//! Each registration is an explicit little state machine
//! (`Idle → Armed → Visible | Removed`): `Armed` covers the optional
//! activation delay, and leaving view before the delay fires cancels the
//! timer without a spurious visible transition. Teardown goes through
//! [`PoolRegistration`], which is idempotent and guarantees the callback is
//! never invoked afterwards.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use vantage_core::{
    IntersectionEntry, IntersectionHost, IntersectionWatcher, RootMargin, RuntimeHandle, TargetId,
    TimerGuard, WatcherOptions,
};

/// Per-registration observation parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObserveOptions {
    /// Fraction of the target that must intersect before it counts as
    /// visible.
    pub threshold: f32,
    pub root_margin: RootMargin,
    /// Stop observing after the first visible transition.
    pub trigger_once: bool,
    /// How long the target must stay in view before the visible transition
    /// is reported.
    pub delay: Duration,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            root_margin: RootMargin::bottom_inset(50),
            trigger_once: true,
            delay: Duration::ZERO,
        }
    }
}

/// Watcher cache key. Threshold is keyed by bit pattern; two registrations
/// share a watcher only when all three parameters match exactly.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ObserverKey {
    threshold_bits: u32,
    root_margin: RootMargin,
    trigger_once: bool,
}

impl ObserverKey {
    fn from_options(options: &ObserveOptions) -> Self {
        Self {
            threshold_bits: options.threshold.to_bits(),
            root_margin: options.root_margin,
            trigger_once: options.trigger_once,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RegistrationState {
    /// Registered, not currently transitioning.
    Idle,
    /// Entered view, activation delay pending.
    Armed,
    /// Visible transition delivered.
    Visible,
}

type VisibilityCallback = Rc<RefCell<dyn FnMut(bool)>>;

struct TargetEntry {
    callback: VisibilityCallback,
    /// Cleared on unregistration; gates every deferred invocation.
    alive: Rc<Cell<bool>>,
    trigger_once: bool,
    delay: Duration,
    pending_timer: Option<TimerGuard>,
    state: RegistrationState,
}

struct SharedWatcher {
    watcher: Box<dyn IntersectionWatcher>,
    targets: FxHashMap<TargetId, TargetEntry>,
}

struct PoolInner {
    runtime: RuntimeHandle,
    host: Rc<dyn IntersectionHost>,
    watchers: FxHashMap<ObserverKey, SharedWatcher>,
    watchers_created: usize,
    warned_missing_capability: bool,
}

/// Process-wide cache of shared intersection watchers.
///
/// Constructed once at startup; all access to the keyed watcher map goes
/// through [`register`](ObserverPool::register) and the returned
/// [`PoolRegistration`]. Clones share the same pool.
#[derive(Clone)]
pub struct ObserverPool {
    inner: Rc<RefCell<PoolInner>>,
}

impl ObserverPool {
    pub fn new(runtime: RuntimeHandle, host: Rc<dyn IntersectionHost>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(PoolInner {
                runtime,
                host,
                watchers: FxHashMap::default(),
                watchers_created: 0,
                warned_missing_capability: false,
            })),
        }
    }

    /// Subscribes `target` to visibility changes.
    ///
    /// If the host provides no intersection capability the pool fails open:
    /// the callback is invoked synchronously with `true` and the returned
    /// registration is inert. Content degrades to "always visible", never to
    /// permanently hidden.
    pub fn register(
        &self,
        target: TargetId,
        options: ObserveOptions,
        on_visibility: impl FnMut(bool) + 'static,
    ) -> PoolRegistration {
        let callback: VisibilityCallback = Rc::new(RefCell::new(on_visibility));
        let alive = Rc::new(Cell::new(true));
        let key = ObserverKey::from_options(&options);

        if !self.inner.borrow().watchers.contains_key(&key) {
            let host = self.inner.borrow().host.clone();
            let weak = Rc::downgrade(&self.inner);
            let batch_key = key.clone();
            let on_batch: Rc<dyn Fn(&[IntersectionEntry])> = Rc::new(move |entries| {
                if let Some(inner) = weak.upgrade() {
                    Self::dispatch_batch(&inner, &batch_key, entries);
                }
            });
            let watcher = host.create_watcher(
                WatcherOptions {
                    threshold: options.threshold,
                    root_margin: options.root_margin,
                },
                on_batch,
            );
            match watcher {
                Some(watcher) => {
                    let mut inner = self.inner.borrow_mut();
                    inner.watchers.insert(
                        key.clone(),
                        SharedWatcher {
                            watcher,
                            targets: FxHashMap::default(),
                        },
                    );
                    inner.watchers_created += 1;
                }
                None => {
                    {
                        let mut inner = self.inner.borrow_mut();
                        if !inner.warned_missing_capability {
                            inner.warned_missing_capability = true;
                            log::warn!(
                                "host provides no intersection observation; \
                                 reporting every target as visible"
                            );
                        }
                    }
                    (&mut *callback.borrow_mut())(true);
                    alive.set(false);
                    return PoolRegistration::inert(target);
                }
            }
        }

        {
            let mut inner = self.inner.borrow_mut();
            if let Some(shared) = inner.watchers.get_mut(&key) {
                shared.watcher.observe(target);
                shared.targets.insert(
                    target,
                    TargetEntry {
                        callback,
                        alive: Rc::clone(&alive),
                        trigger_once: options.trigger_once,
                        delay: options.delay,
                        pending_timer: None,
                        state: RegistrationState::Idle,
                    },
                );
            }
        }

        PoolRegistration {
            pool: Rc::downgrade(&self.inner),
            key: Some(key),
            target,
            alive,
        }
    }

    /// Number of live shared watchers.
    pub fn watcher_count(&self) -> usize {
        self.inner.borrow().watchers.len()
    }

    /// Instrumentation: how many watchers were ever created. Two
    /// registrations with identical parameters must not bump this twice.
    pub fn watchers_created(&self) -> usize {
        self.inner.borrow().watchers_created
    }

    fn dispatch_batch(
        inner: &Rc<RefCell<PoolInner>>,
        key: &ObserverKey,
        entries: &[IntersectionEntry],
    ) {
        // (callback, alive, visible) triples, invoked only after the pool
        // borrow is released: callbacks may re-enter the pool.
        let mut invocations: SmallVec<[(VisibilityCallback, Rc<Cell<bool>>, bool); 4]> =
            SmallVec::new();

        {
            let mut pool = inner.borrow_mut();
            let runtime = pool.runtime.clone();
            let Some(shared) = pool.watchers.get_mut(key) else {
                return;
            };
            let mut finished: SmallVec<[TargetId; 4]> = SmallVec::new();

            for entry in entries {
                let Some(registration) = shared.targets.get_mut(&entry.target) else {
                    continue;
                };
                if entry.is_intersecting {
                    match registration.state {
                        RegistrationState::Idle => {
                            if registration.delay > Duration::ZERO {
                                registration.state = RegistrationState::Armed;
                                let weak = Rc::downgrade(inner);
                                let timer_key = key.clone();
                                let target = entry.target;
                                registration.pending_timer = Some(TimerGuard::schedule(
                                    &runtime,
                                    registration.delay,
                                    move || {
                                        if let Some(inner) = weak.upgrade() {
                                            Self::delay_elapsed(&inner, &timer_key, target);
                                        }
                                    },
                                ));
                            } else {
                                registration.state = RegistrationState::Visible;
                                invocations.push((
                                    Rc::clone(&registration.callback),
                                    Rc::clone(&registration.alive),
                                    true,
                                ));
                                if registration.trigger_once {
                                    finished.push(entry.target);
                                }
                            }
                        }
                        RegistrationState::Armed | RegistrationState::Visible => {}
                    }
                } else if registration.pending_timer.is_some() {
                    // Left view before the activation delay fired: cancel,
                    // no visible transition.
                    registration.pending_timer = None;
                    registration.state = RegistrationState::Idle;
                } else if !registration.trigger_once {
                    registration.state = RegistrationState::Idle;
                    invocations.push((
                        Rc::clone(&registration.callback),
                        Rc::clone(&registration.alive),
                        false,
                    ));
                }
            }

            for target in finished {
                shared.watcher.unobserve(target);
                shared.targets.remove(&target);
            }
        }

        for (callback, alive, visible) in invocations {
            if alive.get() {
                (&mut *callback.borrow_mut())(visible);
            }
        }
    }

    fn delay_elapsed(inner: &Rc<RefCell<PoolInner>>, key: &ObserverKey, target: TargetId) {
        let invocation = {
            let mut pool = inner.borrow_mut();
            let Some(shared) = pool.watchers.get_mut(key) else {
                return;
            };
            let Some(registration) = shared.targets.get_mut(&target) else {
                return;
            };
            // The timer is cancelled whenever the target exits view, so
            // reaching here means the target is still intersecting.
            if registration.state != RegistrationState::Armed {
                return;
            }
            registration.pending_timer = None;
            registration.state = RegistrationState::Visible;
            let invocation = (
                Rc::clone(&registration.callback),
                Rc::clone(&registration.alive),
            );
            if registration.trigger_once {
                shared.watcher.unobserve(target);
                shared.targets.remove(&target);
            }
            invocation
        };

        let (callback, alive) = invocation;
        if alive.get() {
            (&mut *callback.borrow_mut())(true);
        }
    }
}

/// Owner-side handle for one registration.
///
/// Unregistering stops observation, drops the side-table entry and cancels
/// any in-flight activation timer; calling it twice (or dropping after an
/// explicit call) is a no-op. The shared watcher itself stays cached for
/// reuse.
pub struct PoolRegistration {
    pool: Weak<RefCell<PoolInner>>,
    key: Option<ObserverKey>,
    target: TargetId,
    alive: Rc<Cell<bool>>,
}

impl PoolRegistration {
    fn inert(target: TargetId) -> Self {
        Self {
            pool: Weak::new(),
            key: None,
            target,
            alive: Rc::new(Cell::new(false)),
        }
    }

    /// True until the registration is torn down (or was created inert).
    pub fn is_active(&self) -> bool {
        self.key.is_some() && self.alive.get()
    }

    pub fn unregister(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };
        self.alive.set(false);
        if let Some(inner) = self.pool.upgrade() {
            let mut pool = inner.borrow_mut();
            if let Some(shared) = pool.watchers.get_mut(&key) {
                // Entry drop cancels any pending activation timer.
                shared.targets.remove(&self.target);
                shared.watcher.unobserve(self.target);
            }
        }
    }
}

impl Drop for PoolRegistration {
    fn drop(&mut self) {
        self.unregister();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vantage_core::Runtime;
    use vantage_testing::{AbsentIntersectionHost, ScriptedIntersectionHost};

    fn pool_with_host(runtime: &Runtime) -> (ObserverPool, ScriptedIntersectionHost) {
        let host = ScriptedIntersectionHost::new();
        let pool = ObserverPool::new(runtime.handle(), Rc::new(host.clone()));
        (pool, host)
    }

    fn record_visibility() -> (Rc<RefCell<Vec<bool>>>, impl FnMut(bool) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        (seen, move |visible| sink.borrow_mut().push(visible))
    }

    #[test]
    fn identical_options_share_one_watcher() {
        let runtime = Runtime::new();
        let (pool, host) = pool_with_host(&runtime);

        let _a = pool.register(TargetId(1), ObserveOptions::default(), |_| {});
        let _b = pool.register(TargetId(2), ObserveOptions::default(), |_| {});

        assert_eq!(host.created_watchers(), 1);
        assert_eq!(pool.watchers_created(), 1);
        assert_eq!(host.observed_count(), 2);
    }

    #[test]
    fn distinct_options_get_distinct_watchers() {
        let runtime = Runtime::new();
        let (pool, host) = pool_with_host(&runtime);

        let _a = pool.register(TargetId(1), ObserveOptions::default(), |_| {});
        let _b = pool.register(
            TargetId(2),
            ObserveOptions {
                threshold: 0.5,
                ..ObserveOptions::default()
            },
            |_| {},
        );

        assert_eq!(host.created_watchers(), 2);
    }

    #[test]
    fn trigger_once_fires_and_stops_observing() {
        let runtime = Runtime::new();
        let (pool, host) = pool_with_host(&runtime);
        let (seen, callback) = record_visibility();

        let _registration = pool.register(TargetId(1), ObserveOptions::default(), callback);
        host.enter(TargetId(1));
        assert_eq!(seen.borrow().as_slice(), &[true]);
        assert!(!host.is_observed(TargetId(1)));

        // Re-entering must not fire again.
        host.enter(TargetId(1));
        assert_eq!(seen.borrow().as_slice(), &[true]);
    }

    #[test]
    fn continuous_mode_reports_both_transitions() {
        let runtime = Runtime::new();
        let (pool, host) = pool_with_host(&runtime);
        let (seen, callback) = record_visibility();

        let _registration = pool.register(
            TargetId(1),
            ObserveOptions {
                trigger_once: false,
                ..ObserveOptions::default()
            },
            callback,
        );
        host.enter(TargetId(1));
        host.exit(TargetId(1));
        host.enter(TargetId(1));
        assert_eq!(seen.borrow().as_slice(), &[true, false, true]);
        assert!(host.is_observed(TargetId(1)));
    }

    #[test]
    fn activation_delay_defers_the_visible_transition() {
        let runtime = Runtime::new();
        let (pool, host) = pool_with_host(&runtime);
        let (seen, callback) = record_visibility();

        let _registration = pool.register(
            TargetId(1),
            ObserveOptions {
                delay: Duration::from_millis(200),
                ..ObserveOptions::default()
            },
            callback,
        );
        host.enter(TargetId(1));
        runtime.advance(Duration::from_millis(150));
        assert!(seen.borrow().is_empty());
        runtime.advance(Duration::from_millis(100));
        assert_eq!(seen.borrow().as_slice(), &[true]);
    }

    #[test]
    fn exit_before_delay_cancels_without_spurious_transition() {
        let runtime = Runtime::new();
        let (pool, host) = pool_with_host(&runtime);
        let (seen, callback) = record_visibility();

        let _registration = pool.register(
            TargetId(1),
            ObserveOptions {
                delay: Duration::from_millis(200),
                ..ObserveOptions::default()
            },
            callback,
        );
        host.enter(TargetId(1));
        runtime.advance(Duration::from_millis(100));
        host.exit(TargetId(1));
        runtime.advance(Duration::from_millis(500));
        assert!(seen.borrow().is_empty());

        // A fresh entry re-arms the delay from scratch.
        host.enter(TargetId(1));
        runtime.advance(Duration::from_millis(200));
        assert_eq!(seen.borrow().as_slice(), &[true]);
    }

    #[test]
    fn unregister_before_trigger_silences_the_callback_forever() {
        let runtime = Runtime::new();
        let (pool, host) = pool_with_host(&runtime);
        let (seen, callback) = record_visibility();

        let mut registration = pool.register(TargetId(1), ObserveOptions::default(), callback);
        registration.unregister();
        host.enter(TargetId(1));
        runtime.advance(Duration::from_secs(1));
        assert!(seen.borrow().is_empty());
        assert!(!host.is_observed(TargetId(1)));
    }

    #[test]
    fn unregister_twice_is_a_no_op() {
        let runtime = Runtime::new();
        let (pool, _host) = pool_with_host(&runtime);

        let mut registration = pool.register(TargetId(1), ObserveOptions::default(), |_| {});
        registration.unregister();
        registration.unregister();
        assert!(!registration.is_active());
    }

    #[test]
    fn unregister_mid_delay_cancels_the_pending_timer() {
        let runtime = Runtime::new();
        let (pool, host) = pool_with_host(&runtime);
        let (seen, callback) = record_visibility();

        let mut registration = pool.register(
            TargetId(1),
            ObserveOptions {
                delay: Duration::from_millis(100),
                ..ObserveOptions::default()
            },
            callback,
        );
        host.enter(TargetId(1));
        registration.unregister();
        runtime.advance(Duration::from_millis(500));
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn watcher_survives_its_last_registrant() {
        let runtime = Runtime::new();
        let (pool, host) = pool_with_host(&runtime);

        {
            let _registration = pool.register(TargetId(1), ObserveOptions::default(), |_| {});
        }
        assert_eq!(pool.watcher_count(), 1);

        // A later registration with the same key reuses the cached watcher.
        let _again = pool.register(TargetId(2), ObserveOptions::default(), |_| {});
        assert_eq!(host.created_watchers(), 1);
    }

    #[test]
    fn missing_capability_fails_open() {
        let runtime = Runtime::new();
        let pool = ObserverPool::new(runtime.handle(), Rc::new(AbsentIntersectionHost));
        let (seen, callback) = record_visibility();

        let mut registration = pool.register(TargetId(1), ObserveOptions::default(), callback);
        assert_eq!(seen.borrow().as_slice(), &[true]);
        assert!(!registration.is_active());
        registration.unregister();
        assert_eq!(pool.watcher_count(), 0);
    }
}
