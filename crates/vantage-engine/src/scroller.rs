// Copyright 2025 The Vantage Authors
// SPDX-License-Identifier: Apache-2.0

//! Windowing calculator for long fixed-height lists.
//!
//! Pure arithmetic over `(scroll_top, item_height, viewport_height,
//! total_count)`; every update is O(1), independent of the item count. The
//! window keeps a fixed overscan of two items beyond the visible span.

/// Extra items rendered beyond the exactly-visible span.
const OVERSCAN_ITEMS: usize = 2;

/// The currently rendered slice of the list.
///
/// Invariants: `start_index <= end_index <= total_count` and
/// `offset_y == start_index * item_height`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VirtualWindow {
    pub start_index: usize,
    pub end_index: usize,
    /// Translation applied to the rendered slice so it lines up with where
    /// the full list would have put it.
    pub offset_y: f32,
}

pub struct VirtualScroller {
    item_height: f32,
    total_count: usize,
    visible_count: usize,
    scroll_top: f32,
    window: VirtualWindow,
}

impl VirtualScroller {
    /// Creates a scroller for `total_count` items of `item_height` pixels
    /// each. The window stays empty until [`set_viewport`](Self::set_viewport)
    /// provides a height.
    pub fn new(item_height: f32, total_count: usize) -> Self {
        let item_height = if item_height > 0.0 {
            item_height
        } else {
            log::warn!("VirtualScroller: non-positive item height, clamping to 1px");
            1.0
        };
        let mut scroller = Self {
            item_height,
            total_count,
            visible_count: OVERSCAN_ITEMS,
            scroll_top: 0.0,
            window: VirtualWindow::default(),
        };
        scroller.update_window();
        scroller
    }

    /// Sets the viewport height and recomputes the window in place.
    pub fn set_viewport(&mut self, height_px: f32) {
        let height_px = height_px.max(0.0);
        self.visible_count = (height_px / self.item_height).ceil() as usize + OVERSCAN_ITEMS;
        self.update_window();
    }

    /// Updates the item count (for example when the backing list changes),
    /// clamping the window to the new bounds.
    pub fn set_total_count(&mut self, total_count: usize) {
        self.total_count = total_count;
        self.update_window();
    }

    /// Records a scroll position and returns the recomputed window.
    pub fn on_scroll(&mut self, scroll_top_px: f32) -> VirtualWindow {
        self.scroll_top = scroll_top_px.max(0.0);
        self.update_window();
        self.window
    }

    pub fn window(&self) -> VirtualWindow {
        self.window
    }

    fn update_window(&mut self) {
        let start_index =
            ((self.scroll_top / self.item_height).floor() as usize).min(self.total_count);
        let end_index = (start_index + self.visible_count).min(self.total_count);
        self.window = VirtualWindow {
            start_index,
            end_index,
            offset_y: start_index as f32 * self.item_height,
        };
    }
}
