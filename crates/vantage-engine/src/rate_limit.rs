//! Call-rate shaping for high-frequency event callbacks.
//!
//! Three wrappers over a boxed callback: trailing/leading debounce, a
//! leading-edge throttle whose window reopens on a timer, and a frame-paced
//! throttle that coalesces everything before the next frame tick into one
//! invocation. All of them tear their pending scheduling down on drop;
//! cancelling twice is a no-op.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use vantage_core::{FrameRequest, RuntimeHandle, TimerGuard};

type Callback = Rc<RefCell<dyn FnMut()>>;

struct DebouncedInner {
    runtime: RuntimeHandle,
    wait: Duration,
    immediate: bool,
    pending: Option<TimerGuard>,
    callback: Callback,
}

/// Debounce: the callback fires only after `wait` elapses with no further
/// calls. With `immediate`, the first call of a burst fires synchronously
/// instead and the rest of the burst is suppressed.
pub struct Debounced {
    inner: Rc<RefCell<DebouncedInner>>,
}

impl Debounced {
    pub fn new(
        runtime: RuntimeHandle,
        wait: Duration,
        immediate: bool,
        callback: impl FnMut() + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(DebouncedInner {
                runtime,
                wait,
                immediate,
                pending: None,
                callback: Rc::new(RefCell::new(callback)),
            })),
        }
    }

    pub fn call(&self) {
        let call_now = {
            let mut inner = self.inner.borrow_mut();
            let call_now = inner.immediate && inner.pending.is_none();
            let weak = Rc::downgrade(&self.inner);
            let guard = TimerGuard::schedule(&inner.runtime.clone(), inner.wait, move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let fire = {
                    let mut inner = inner.borrow_mut();
                    inner.pending = None;
                    if inner.immediate {
                        // Window closed; the next call leads a new burst.
                        None
                    } else {
                        Some(Rc::clone(&inner.callback))
                    }
                };
                if let Some(callback) = fire {
                    (&mut *callback.borrow_mut())();
                }
            });
            // Replacing the guard cancels the previous pending timer.
            inner.pending = Some(guard);
            if call_now {
                Some(Rc::clone(&inner.callback))
            } else {
                None
            }
        };
        if let Some(callback) = call_now {
            (&mut *callback.borrow_mut())();
        }
    }

    /// Drops any pending invocation.
    pub fn cancel(&self) {
        self.inner.borrow_mut().pending = None;
    }
}

struct ThrottledInner {
    runtime: RuntimeHandle,
    limit: Duration,
    window: Option<TimerGuard>,
    callback: Callback,
}

/// Leading-edge throttle: the first call of a burst fires immediately,
/// everything else inside the window is dropped, and the window reopens
/// `limit` later.
pub struct Throttled {
    inner: Rc<RefCell<ThrottledInner>>,
}

impl Throttled {
    pub fn new(
        runtime: RuntimeHandle,
        limit: Duration,
        callback: impl FnMut() + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ThrottledInner {
                runtime,
                limit,
                window: None,
                callback: Rc::new(RefCell::new(callback)),
            })),
        }
    }

    pub fn call(&self) {
        let fire = {
            let mut inner = self.inner.borrow_mut();
            if inner.window.is_some() {
                None
            } else {
                let weak = Rc::downgrade(&self.inner);
                let guard = TimerGuard::schedule(&inner.runtime.clone(), inner.limit, move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.borrow_mut().window = None;
                    }
                });
                inner.window = Some(guard);
                Some(Rc::clone(&inner.callback))
            }
        };
        if let Some(callback) = fire {
            (&mut *callback.borrow_mut())();
        }
    }
}

struct FrameThrottledInner {
    runtime: RuntimeHandle,
    pending: Option<FrameRequest>,
    callback: Callback,
}

/// Frame-paced throttle: any number of calls before the next frame tick
/// collapse into a single invocation. Calls while one is pending are no-ops,
/// not queued.
pub struct FrameThrottled {
    inner: Rc<RefCell<FrameThrottledInner>>,
}

impl FrameThrottled {
    pub fn new(runtime: RuntimeHandle, callback: impl FnMut() + 'static) -> Self {
        Self {
            inner: Rc::new(RefCell::new(FrameThrottledInner {
                runtime,
                pending: None,
                callback: Rc::new(RefCell::new(callback)),
            })),
        }
    }

    pub fn call(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.pending.is_some() {
            return;
        }
        let weak = Rc::downgrade(&self.inner);
        let request = FrameRequest::request(&inner.runtime.clone(), move |_| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let callback = {
                let mut inner = inner.borrow_mut();
                inner.pending = None;
                Rc::clone(&inner.callback)
            };
            (&mut *callback.borrow_mut())();
        });
        inner.pending = Some(request);
    }
}
