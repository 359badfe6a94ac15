//! Diagnostic runtime sampler.
//!
//! Counts frame ticks into rolling one-second windows and reports FPS (plus
//! the average of any render spans the host fed in during the window);
//! separately samples heap usage on a fixed interval when the host offers
//! memory introspection. Inert until started, cheap to stop, and a failure
//! in any one metric never takes down the others. Intended for a
//! development overlay, not production logic.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use vantage_core::{FrameRequest, MemoryProbe, MemorySample, RuntimeHandle, TimerGuard};

/// Minimum elapsed time before an FPS window closes.
const FPS_WINDOW: Duration = Duration::from_millis(1000);

/// Interval between memory samples.
const MEMORY_INTERVAL: Duration = Duration::from_millis(2000);

/// Per-window frame statistics.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameStats {
    pub fps: u32,
    /// Average render span over the window, in milliseconds; absent when the
    /// host fed no spans in.
    pub render_time_ms: Option<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SamplerEvent {
    Frame(FrameStats),
    Memory(MemorySample),
}

type SamplerCallback = Rc<RefCell<dyn FnMut(SamplerEvent)>>;

struct SamplerInner {
    runtime: RuntimeHandle,
    probe: Option<Rc<dyn MemoryProbe>>,
    callback: Option<SamplerCallback>,
    frame_request: Option<FrameRequest>,
    memory_timer: Option<TimerGuard>,
    running: bool,
    window_start: Duration,
    frame_count: u32,
    render_accum: Duration,
    render_samples: u32,
    noted_missing_memory: bool,
}

/// Frame-rate and memory sampler for the diagnostic overlay.
pub struct RuntimeSampler {
    inner: Rc<RefCell<SamplerInner>>,
}

impl RuntimeSampler {
    pub fn new(runtime: RuntimeHandle, probe: Option<Rc<dyn MemoryProbe>>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SamplerInner {
                runtime,
                probe,
                callback: None,
                frame_request: None,
                memory_timer: None,
                running: false,
                window_start: Duration::ZERO,
                frame_count: 0,
                render_accum: Duration::ZERO,
                render_samples: 0,
                noted_missing_memory: false,
            })),
        }
    }

    /// Begins sampling. Calling while already running restarts the windows.
    pub fn start(&self, callback: impl FnMut(SamplerEvent) + 'static) {
        self.stop();
        let has_probe = {
            let mut inner = self.inner.borrow_mut();
            inner.running = true;
            inner.callback = Some(Rc::new(RefCell::new(callback)));
            inner.window_start = inner.runtime.now();
            inner.frame_count = 0;
            inner.render_accum = Duration::ZERO;
            inner.render_samples = 0;
            inner.probe.is_some()
        };
        Self::schedule_frame(&self.inner);
        if has_probe {
            Self::schedule_memory(&self.inner);
        }
    }

    /// Cancels all outstanding frame and interval scheduling. Idempotent.
    pub fn stop(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.running = false;
        inner.frame_request = None;
        inner.memory_timer = None;
        inner.callback = None;
    }

    pub fn is_running(&self) -> bool {
        self.inner.borrow().running
    }

    /// Feeds one render span into the current window. No-op while stopped.
    pub fn record_render(&self, elapsed: Duration) {
        let mut inner = self.inner.borrow_mut();
        if !inner.running {
            return;
        }
        inner.render_accum += elapsed;
        inner.render_samples += 1;
    }

    fn schedule_frame(inner: &Rc<RefCell<SamplerInner>>) {
        let runtime = inner.borrow().runtime.clone();
        let weak = Rc::downgrade(inner);
        let request = FrameRequest::request(&runtime, move |_| {
            if let Some(inner) = weak.upgrade() {
                Self::on_frame(&inner);
            }
        });
        inner.borrow_mut().frame_request = Some(request);
    }

    fn on_frame(inner: &Rc<RefCell<SamplerInner>>) {
        let emit = {
            let mut sampler = inner.borrow_mut();
            if !sampler.running {
                return;
            }
            sampler.frame_request = None;
            sampler.frame_count += 1;
            let now = sampler.runtime.now();
            let elapsed = now.saturating_sub(sampler.window_start);
            if elapsed >= FPS_WINDOW {
                let elapsed_ms = elapsed.as_millis().max(1) as f64;
                let fps = (sampler.frame_count as f64 * 1000.0 / elapsed_ms).round() as u32;
                let render_time_ms = if sampler.render_samples > 0 {
                    Some(
                        sampler.render_accum.as_secs_f32() * 1000.0
                            / sampler.render_samples as f32,
                    )
                } else {
                    None
                };
                sampler.frame_count = 0;
                sampler.window_start = now;
                sampler.render_accum = Duration::ZERO;
                sampler.render_samples = 0;
                sampler
                    .callback
                    .clone()
                    .map(|callback| (callback, FrameStats { fps, render_time_ms }))
            } else {
                None
            }
        };
        if let Some((callback, stats)) = emit {
            (&mut *callback.borrow_mut())(SamplerEvent::Frame(stats));
        }
        // The callback may have stopped the sampler mid-dispatch.
        if inner.borrow().running {
            Self::schedule_frame(inner);
        }
    }

    fn schedule_memory(inner: &Rc<RefCell<SamplerInner>>) {
        let runtime = inner.borrow().runtime.clone();
        let weak = Rc::downgrade(inner);
        let guard = TimerGuard::schedule(&runtime, MEMORY_INTERVAL, move || {
            if let Some(inner) = weak.upgrade() {
                Self::on_memory_tick(&inner);
            }
        });
        inner.borrow_mut().memory_timer = Some(guard);
    }

    fn on_memory_tick(inner: &Rc<RefCell<SamplerInner>>) {
        let emit = {
            let mut sampler = inner.borrow_mut();
            if !sampler.running {
                return;
            }
            sampler.memory_timer = None;
            let sample = sampler.probe.as_ref().and_then(|probe| probe.sample());
            match sample {
                Some(sample) => sampler
                    .callback
                    .clone()
                    .map(|callback| (callback, sample)),
                None => {
                    // Omit the metric rather than failing; frame sampling
                    // continues untouched.
                    if !sampler.noted_missing_memory {
                        sampler.noted_missing_memory = true;
                        log::debug!("memory introspection unavailable, omitting heap metric");
                    }
                    None
                }
            }
        };
        if let Some((callback, sample)) = emit {
            (&mut *callback.borrow_mut())(SamplerEvent::Memory(sample));
        }
        if inner.borrow().running {
            Self::schedule_memory(inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vantage_core::Runtime;
    use vantage_testing::FixedMemoryProbe;

    fn collect_events() -> (Rc<RefCell<Vec<SamplerEvent>>>, impl FnMut(SamplerEvent) + 'static)
    {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        (events, move |event| sink.borrow_mut().push(event))
    }

    fn drive_frames(runtime: &Runtime, frames: u32, frame_ms: u64) {
        for index in 0..frames {
            runtime.advance(Duration::from_millis(frame_ms));
            runtime.tick_frame(u64::from(index) * frame_ms * 1_000_000);
        }
    }

    #[test]
    fn reports_fps_after_each_window() {
        let runtime = Runtime::new();
        let sampler = RuntimeSampler::new(runtime.handle(), None);
        let (events, callback) = collect_events();
        sampler.start(callback);

        // 60 frames spaced ~17 ms apart: just over one second.
        drive_frames(&runtime, 60, 17);

        let events = events.borrow();
        let fps = events.iter().find_map(|event| match event {
            SamplerEvent::Frame(stats) => Some(stats.fps),
            _ => None,
        });
        let fps = fps.expect("a frame window should have closed");
        assert!((55..=62).contains(&fps), "unexpected fps {fps}");
    }

    #[test]
    fn averages_render_spans_over_the_window() {
        let runtime = Runtime::new();
        let sampler = RuntimeSampler::new(runtime.handle(), None);
        let (events, callback) = collect_events();
        sampler.start(callback);

        sampler.record_render(Duration::from_millis(4));
        sampler.record_render(Duration::from_millis(8));
        drive_frames(&runtime, 65, 16);

        let render = events.borrow().iter().find_map(|event| match event {
            SamplerEvent::Frame(stats) => stats.render_time_ms,
            _ => None,
        });
        let render = render.expect("render average should be present");
        assert!((render - 6.0).abs() < 0.1, "unexpected average {render}");
    }

    #[test]
    fn samples_memory_on_its_own_interval() {
        let runtime = Runtime::new();
        let probe = Rc::new(FixedMemoryProbe::reporting(128, 512));
        let sampler = RuntimeSampler::new(runtime.handle(), Some(probe));
        let (events, callback) = collect_events();
        sampler.start(callback);

        runtime.advance(Duration::from_millis(2000));
        let memory = events.borrow().iter().find_map(|event| match event {
            SamplerEvent::Memory(sample) => Some(*sample),
            _ => None,
        });
        assert_eq!(
            memory,
            Some(MemorySample {
                used_mb: 128,
                total_mb: 512
            })
        );
    }

    #[test]
    fn missing_memory_introspection_omits_the_metric_but_keeps_frames() {
        let runtime = Runtime::new();
        let probe = Rc::new(FixedMemoryProbe::unavailable());
        let sampler = RuntimeSampler::new(runtime.handle(), Some(probe));
        let (events, callback) = collect_events();
        sampler.start(callback);

        drive_frames(&runtime, 140, 16);

        let events = events.borrow();
        assert!(events
            .iter()
            .all(|event| matches!(event, SamplerEvent::Frame(_))));
        assert!(!events.is_empty());
    }

    #[test]
    fn stop_cancels_all_scheduling() {
        let runtime = Runtime::new();
        let probe = Rc::new(FixedMemoryProbe::reporting(128, 512));
        let sampler = RuntimeSampler::new(runtime.handle(), Some(probe));
        let (events, callback) = collect_events();
        sampler.start(callback);
        sampler.stop();
        sampler.stop();

        drive_frames(&runtime, 200, 16);
        assert!(events.borrow().is_empty());
        assert!(!sampler.is_running());
    }

    #[test]
    fn inert_until_started() {
        let runtime = Runtime::new();
        let sampler = RuntimeSampler::new(runtime.handle(), None);
        sampler.record_render(Duration::from_millis(4));
        drive_frames(&runtime, 10, 16);
        assert!(!sampler.is_running());
    }
}
