//! End-to-end flow through the engine facade: capability classification,
//! viewport-gated image loading, crossfade timing and the diagnostic
//! sampler, all driven through the scripted host doubles.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use vantage_core::{EffectiveConnection, HostCapabilities, Runtime, TargetId};
use vantage_engine::{
    DeviceTier, Engine, ImageLoadState, ImageOptions, SamplerEvent, VirtualScroller,
    VisibilityOptions,
};
use vantage_testing::{FixedMemoryProbe, ScriptedFetcher, ScriptedIntersectionHost};

struct World {
    runtime: Runtime,
    host: ScriptedIntersectionHost,
    fetcher: ScriptedFetcher,
    engine: Engine,
}

fn world(capabilities: HostCapabilities) -> World {
    let runtime = Runtime::new();
    let host = ScriptedIntersectionHost::new();
    let fetcher = ScriptedFetcher::new();
    let engine = Engine::new(
        runtime.handle(),
        capabilities,
        Rc::new(host.clone()),
        Rc::new(fetcher.clone()),
        Some(Rc::new(FixedMemoryProbe::reporting(256, 1024))),
    );
    World {
        runtime,
        host,
        fetcher,
        engine,
    }
}

fn high_end() -> HostCapabilities {
    HostCapabilities {
        hardware_concurrency: Some(8),
        device_memory_gb: Some(16.0),
        network: Some(EffectiveConnection::Cell4g),
        prefers_reduced_motion: false,
    }
}

#[test]
fn scroll_reveal_loads_images_lazily_and_crossfades() {
    let w = world(high_end());
    assert_eq!(w.engine.tier(), DeviceTier::High);

    let source = "https://images.unsplash.com/photo-9?auto=format";
    let image = w
        .engine
        .load_image(TargetId(1), source, ImageOptions::default());

    // Nothing fetched until the element scrolls into view.
    assert_eq!(image.state(), ImageLoadState::Pending);
    assert!(w.fetcher.pending().is_empty());
    assert!(image.placeholder_url().contains("blur=5"));

    w.host.enter(TargetId(1));
    assert_eq!(image.state(), ImageLoadState::Loading);
    assert_eq!(w.fetcher.pending(), vec![image.resolved_url()]);

    w.fetcher.resolve(&image.resolved_url());
    assert_eq!(image.state(), ImageLoadState::Loaded);
    assert_eq!(image.opacity(), 0.0);

    // High tier fades over 0.6 s.
    w.runtime.advance(Duration::from_millis(300));
    let mid = image.opacity();
    assert!(mid > 0.0 && mid < 1.0, "mid-fade opacity {mid}");
    w.runtime.advance(Duration::from_millis(600));
    assert_eq!(image.opacity(), 1.0);
}

#[test]
fn low_tier_devices_get_reduced_motion_and_instant_reveal() {
    let w = world(HostCapabilities {
        hardware_concurrency: Some(2),
        ..high_end()
    });
    assert_eq!(w.engine.tier(), DeviceTier::Low);
    assert!(w.engine.config().reduced_motion);

    let image = w.engine.load_image(
        TargetId(3),
        "https://images.unsplash.com/photo-3",
        ImageOptions {
            priority: true,
            ..ImageOptions::default()
        },
    );
    // Priority skips the viewport gate.
    assert_eq!(image.state(), ImageLoadState::Loading);
    w.fetcher.resolve(&image.resolved_url());
    assert_eq!(image.opacity(), 1.0);
}

#[test]
fn visibility_and_images_multiplex_one_watcher_per_key() {
    let w = world(high_end());

    let reveal = w
        .engine
        .watch_visibility(TargetId(10), VisibilityOptions::default());
    let _a = w.engine.load_image(
        TargetId(11),
        "https://example.com/a.jpg",
        ImageOptions::default(),
    );
    let _b = w.engine.load_image(
        TargetId(12),
        "https://example.com/b.jpg",
        ImageOptions::default(),
    );
    assert_eq!(w.host.created_watchers(), 1);

    w.host.enter(TargetId(10));
    assert!(reveal.is_visible());
}

#[test]
fn sampler_reports_frames_and_memory_through_the_facade() {
    let w = world(high_end());
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    w.engine
        .sampler()
        .start(move |event| sink.borrow_mut().push(event));

    for index in 0..130u64 {
        w.runtime.advance(Duration::from_millis(16));
        w.runtime.tick_frame(index * 16_000_000);
    }

    let events = events.borrow();
    assert!(events
        .iter()
        .any(|event| matches!(event, SamplerEvent::Frame(stats) if stats.fps > 0)));
    assert!(events
        .iter()
        .any(|event| matches!(event, SamplerEvent::Memory(sample) if sample.used_mb == 256)));
}

#[test]
fn windowing_stays_bounded_while_scrolling_a_long_list() {
    let mut scroller = VirtualScroller::new(50.0, 10_000);
    scroller.set_viewport(600.0);

    for scroll in [0.0, 5_000.0, 250_000.0, 499_950.0] {
        let window = scroller.on_scroll(scroll);
        assert!(window.end_index - window.start_index <= 14);
        assert!(window.end_index <= 10_000);
        assert_eq!(window.offset_y, window.start_index as f32 * 50.0);
    }
}
