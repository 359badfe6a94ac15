//! Virtual-clock scheduler for the engine.
//!
//! Everything in Vantage is single-threaded and callback driven: intersection
//! batches, delay timers, frame-paced callbacks and image-fetch completions
//! all re-enter the same execution context. The runtime owns the two queues
//! those re-entries come from (timers and frame callbacks) and a virtual
//! clock that the embedding host advances explicitly. Nothing here sleeps or
//! spawns; determinism is the point.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Identifies a scheduled timer so it can be cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// Identifies a registered frame callback so it can be cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameCallbackId(u64);

struct TimerEntry {
    id: u64,
    deadline: Duration,
    callback: Box<dyn FnOnce()>,
}

struct FrameEntry {
    id: u64,
    callback: Box<dyn FnOnce(u64)>,
}

struct RuntimeInner {
    now: Duration,
    next_id: u64,
    timers: Vec<TimerEntry>,
    frames: Vec<FrameEntry>,
}

impl RuntimeInner {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Removes and returns the earliest timer due at or before `target`.
    /// Deadline ties resolve in scheduling order.
    fn take_due_timer(&mut self, target: Duration) -> Option<TimerEntry> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, timer)| timer.deadline <= target)
            .min_by_key(|(_, timer)| (timer.deadline, timer.id))
            .map(|(index, _)| index)?;
        Some(self.timers.swap_remove(index))
    }
}

/// Owner of the scheduling queues. The embedding host keeps the `Runtime`
/// alive and drives it from its own event loop; engine components only ever
/// hold [`RuntimeHandle`]s.
pub struct Runtime {
    inner: Rc<RefCell<RuntimeInner>>,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(RuntimeInner {
                now: Duration::ZERO,
                next_id: 1,
                timers: Vec::new(),
                frames: Vec::new(),
            })),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    /// Advances the virtual clock by `dt`, running every timer that comes due
    /// in deadline order. A timer scheduled by another timer's callback still
    /// fires within the same call when its deadline falls inside the window.
    pub fn advance(&self, dt: Duration) {
        let target = self.inner.borrow().now + dt;
        loop {
            let due = {
                let mut inner = self.inner.borrow_mut();
                match inner.take_due_timer(target) {
                    Some(timer) => {
                        inner.now = inner.now.max(timer.deadline);
                        Some(timer)
                    }
                    None => None,
                }
            };
            match due {
                Some(timer) => (timer.callback)(),
                None => break,
            }
        }
        self.inner.borrow_mut().now = target;
    }

    /// Delivers one frame tick. Callbacks registered before the tick run
    /// exactly once; callbacks registered during the tick wait for the next
    /// one.
    pub fn tick_frame(&self, frame_time_nanos: u64) {
        let frames = std::mem::take(&mut self.inner.borrow_mut().frames);
        for frame in frames {
            (frame.callback)(frame_time_nanos);
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Weak, cheaply clonable handle used by engine components to schedule work.
///
/// A handle that outlives its runtime becomes inert: scheduling returns
/// `None` and cancellation is a no-op. Components treat an inert handle as a
/// missing capability, never as an error.
#[derive(Clone)]
pub struct RuntimeHandle {
    inner: Weak<RefCell<RuntimeInner>>,
}

impl RuntimeHandle {
    pub fn now(&self) -> Duration {
        self.inner
            .upgrade()
            .map(|inner| inner.borrow().now)
            .unwrap_or(Duration::ZERO)
    }

    pub fn set_timeout(
        &self,
        delay: Duration,
        callback: impl FnOnce() + 'static,
    ) -> Option<TimerId> {
        let inner = self.inner.upgrade()?;
        let mut inner = inner.borrow_mut();
        let id = inner.allocate_id();
        let deadline = inner.now + delay;
        inner.timers.push(TimerEntry {
            id,
            deadline,
            callback: Box::new(callback),
        });
        Some(TimerId(id))
    }

    pub fn cancel_timer(&self, id: TimerId) {
        if let Some(inner) = self.inner.upgrade() {
            inner.borrow_mut().timers.retain(|timer| timer.id != id.0);
        }
    }

    pub fn request_frame(
        &self,
        callback: impl FnOnce(u64) + 'static,
    ) -> Option<FrameCallbackId> {
        let inner = self.inner.upgrade()?;
        let mut inner = inner.borrow_mut();
        let id = inner.allocate_id();
        inner.frames.push(FrameEntry {
            id,
            callback: Box::new(callback),
        });
        Some(FrameCallbackId(id))
    }

    pub fn cancel_frame(&self, id: FrameCallbackId) {
        if let Some(inner) = self.inner.upgrade() {
            inner.borrow_mut().frames.retain(|frame| frame.id != id.0);
        }
    }
}

/// Cancels its timer when dropped. Replacing the guard inside an `Option`
/// is the idiomatic way to reset a pending timer.
pub struct TimerGuard {
    runtime: RuntimeHandle,
    id: Option<TimerId>,
}

impl TimerGuard {
    pub fn schedule(
        runtime: &RuntimeHandle,
        delay: Duration,
        callback: impl FnOnce() + 'static,
    ) -> Self {
        let id = runtime.set_timeout(delay, callback);
        Self {
            runtime: runtime.clone(),
            id,
        }
    }

    pub fn is_active(&self) -> bool {
        self.id.is_some()
    }

    pub fn cancel(&mut self) {
        if let Some(id) = self.id.take() {
            self.runtime.cancel_timer(id);
        }
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Cancels its frame callback when dropped.
pub struct FrameRequest {
    runtime: RuntimeHandle,
    id: Option<FrameCallbackId>,
}

impl FrameRequest {
    pub fn request(runtime: &RuntimeHandle, callback: impl FnOnce(u64) + 'static) -> Self {
        let id = runtime.request_frame(callback);
        Self {
            runtime: runtime.clone(),
            id,
        }
    }

    pub fn is_active(&self) -> bool {
        self.id.is_some()
    }

    pub fn cancel(&mut self) {
        if let Some(id) = self.id.take() {
            self.runtime.cancel_frame(id);
        }
    }
}

impl Drop for FrameRequest {
    fn drop(&mut self) {
        self.cancel();
    }
}
