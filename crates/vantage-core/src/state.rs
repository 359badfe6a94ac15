//! Minimal observable value cells.
//!
//! The engine exposes a few values the presentation layer polls each frame
//! (visibility flags, image load state). [`MutableState`] is the writer side,
//! [`State`] the read-only view handed to consumers. Both are cheap clones of
//! the same cell; everything is single-threaded.

use std::cell::RefCell;
use std::rc::Rc;

pub struct MutableState<T> {
    inner: Rc<RefCell<T>>,
}

impl<T: Clone> MutableState<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(initial)),
        }
    }

    pub fn get(&self) -> T {
        self.inner.borrow().clone()
    }

    pub fn set_value(&self, value: T) {
        *self.inner.borrow_mut() = value;
    }

    /// Read-only view sharing the same cell.
    pub fn as_state(&self) -> State<T> {
        State {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Clone for MutableState<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

pub struct State<T> {
    inner: Rc<RefCell<T>>,
}

impl<T: Clone> State<T> {
    pub fn get(&self) -> T {
        self.inner.borrow().clone()
    }
}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}
