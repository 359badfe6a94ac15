//! Scriptable intersection host.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use vantage_core::{
    IntersectionEntry, IntersectionHost, IntersectionWatcher, TargetId, WatcherOptions,
};

struct WatcherRecord {
    options: WatcherOptions,
    on_batch: Rc<dyn Fn(&[IntersectionEntry])>,
    observed: Vec<TargetId>,
}

struct HostInner {
    watchers: Vec<WatcherRecord>,
    created: usize,
}

/// An intersection host whose batches are produced by the test itself via
/// [`ScriptedIntersectionHost::enter`] / [`exit`](ScriptedIntersectionHost::exit).
/// Also counts how many underlying watchers were ever instantiated, which is
/// how tests assert the pool's de-duplication invariant.
#[derive(Clone)]
pub struct ScriptedIntersectionHost {
    inner: Rc<RefCell<HostInner>>,
}

impl ScriptedIntersectionHost {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(HostInner {
                watchers: Vec::new(),
                created: 0,
            })),
        }
    }

    /// Number of underlying watchers instantiated over the host's lifetime.
    pub fn created_watchers(&self) -> usize {
        self.inner.borrow().created
    }

    /// Number of targets currently observed, across all watchers.
    pub fn observed_count(&self) -> usize {
        self.inner
            .borrow()
            .watchers
            .iter()
            .map(|watcher| watcher.observed.len())
            .sum()
    }

    pub fn is_observed(&self, target: TargetId) -> bool {
        self.inner
            .borrow()
            .watchers
            .iter()
            .any(|watcher| watcher.observed.contains(&target))
    }

    pub fn options_of_watcher(&self, index: usize) -> Option<WatcherOptions> {
        self.inner
            .borrow()
            .watchers
            .get(index)
            .map(|watcher| watcher.options)
    }

    /// Moves `target` into view, delivering a batch to every watcher that
    /// currently observes it.
    pub fn enter(&self, target: TargetId) {
        self.emit(target, true);
    }

    /// Moves `target` out of view.
    pub fn exit(&self, target: TargetId) {
        self.emit(target, false);
    }

    fn emit(&self, target: TargetId, is_intersecting: bool) {
        // Collect callbacks first: dispatching re-enters the pool, which may
        // call back into `unobserve` on this host.
        let callbacks: Vec<Rc<dyn Fn(&[IntersectionEntry])>> = self
            .inner
            .borrow()
            .watchers
            .iter()
            .filter(|watcher| watcher.observed.contains(&target))
            .map(|watcher| Rc::clone(&watcher.on_batch))
            .collect();
        let batch = [IntersectionEntry {
            target,
            is_intersecting,
        }];
        for on_batch in callbacks {
            on_batch(&batch);
        }
    }
}

impl Default for ScriptedIntersectionHost {
    fn default() -> Self {
        Self::new()
    }
}

impl IntersectionHost for ScriptedIntersectionHost {
    fn create_watcher(
        &self,
        options: WatcherOptions,
        on_batch: Rc<dyn Fn(&[IntersectionEntry])>,
    ) -> Option<Box<dyn IntersectionWatcher>> {
        let index = {
            let mut inner = self.inner.borrow_mut();
            inner.watchers.push(WatcherRecord {
                options,
                on_batch,
                observed: Vec::new(),
            });
            inner.created += 1;
            inner.watchers.len() - 1
        };
        Some(Box::new(ScriptedWatcher {
            host: Rc::downgrade(&self.inner),
            index,
        }))
    }
}

struct ScriptedWatcher {
    host: Weak<RefCell<HostInner>>,
    index: usize,
}

impl IntersectionWatcher for ScriptedWatcher {
    fn observe(&mut self, target: TargetId) {
        if let Some(host) = self.host.upgrade() {
            let mut inner = host.borrow_mut();
            if let Some(record) = inner.watchers.get_mut(self.index) {
                if !record.observed.contains(&target) {
                    record.observed.push(target);
                }
            }
        }
    }

    fn unobserve(&mut self, target: TargetId) {
        if let Some(host) = self.host.upgrade() {
            let mut inner = host.borrow_mut();
            if let Some(record) = inner.watchers.get_mut(self.index) {
                record.observed.retain(|observed| *observed != target);
            }
        }
    }
}

/// A host with no intersection capability at all; every `create_watcher`
/// returns `None`, forcing the pool down its fail-open path.
#[derive(Clone, Copy, Debug, Default)]
pub struct AbsentIntersectionHost;

impl IntersectionHost for AbsentIntersectionHost {
    fn create_watcher(
        &self,
        _options: WatcherOptions,
        _on_batch: Rc<dyn Fn(&[IntersectionEntry])>,
    ) -> Option<Box<dyn IntersectionWatcher>> {
        None
    }
}
