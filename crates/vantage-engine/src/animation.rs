//! Animation configuration resolution.
//!
//! Maps a device tier plus the system motion-accessibility preference to one
//! immutable animation/quality configuration. Exactly one configuration
//! exists per (tier, preference) pair; consumers treat it as a value, never
//! mutate it.

use std::time::Duration;

use crate::device::DeviceTier;

/// Easing curves used by the engine's fades.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Easing {
    Linear,
    /// The material-standard cubic bezier (0.4, 0.0, 0.2, 1.0), the curve
    /// every fade in the original presentation layer used.
    Standard,
}

impl Easing {
    /// Applies the easing to a linear fraction in [0, 1].
    pub fn transform(&self, fraction: f32) -> f32 {
        match self {
            Easing::Linear => fraction.clamp(0.0, 1.0),
            Easing::Standard => cubic_bezier(0.4, 0.0, 0.2, 1.0, fraction),
        }
    }
}

/// Evaluates a CSS-style cubic bezier at the given x fraction using binary
/// subdivision on the parametric form.
fn cubic_bezier(x1: f32, y1: f32, x2: f32, y2: f32, fraction: f32) -> f32 {
    if fraction <= 0.0 {
        return 0.0;
    }
    if fraction >= 1.0 {
        return 1.0;
    }

    fn component(p1: f32, p2: f32, t: f32) -> f32 {
        let inv = 1.0 - t;
        3.0 * inv * inv * t * p1 + 3.0 * inv * t * t * p2 + t * t * t
    }

    let mut lo = 0.0f32;
    let mut hi = 1.0f32;
    let mut t = fraction;
    for _ in 0..24 {
        let x = component(x1, x2, t);
        if (x - fraction).abs() < 1e-5 {
            break;
        }
        if x < fraction {
            lo = t;
        } else {
            hi = t;
        }
        t = 0.5 * (lo + hi);
    }
    component(y1, y2, t)
}

/// Immutable animation/quality configuration derived from a device tier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimationConfig {
    /// Fade/transition duration in seconds.
    pub duration: f32,
    /// Delay between staggered siblings in seconds.
    pub stagger_delay: f32,
    pub enable_blur: bool,
    pub enable_shadow: bool,
    /// When set, consumers render content immediately at full opacity and
    /// skip directional/scale transform variants. `duration` still gates
    /// fade timing elsewhere.
    pub reduced_motion: bool,
}

/// Resolves the configuration for a tier and the system motion preference.
///
/// `reduced_motion` is forced for `Low` tier devices as well as for an
/// explicit system preference. Those are different concerns (device headroom
/// vs. user intent); both inputs are kept visible here so a caller can tell
/// which one applied.
pub fn resolve(tier: DeviceTier, system_reduced_motion: bool) -> AnimationConfig {
    let base = match tier {
        DeviceTier::Low => AnimationConfig {
            duration: 0.3,
            stagger_delay: 0.05,
            enable_blur: false,
            enable_shadow: false,
            reduced_motion: true,
        },
        DeviceTier::Medium => AnimationConfig {
            duration: 0.5,
            stagger_delay: 0.08,
            enable_blur: true,
            enable_shadow: false,
            reduced_motion: false,
        },
        DeviceTier::High => AnimationConfig {
            duration: 0.6,
            stagger_delay: 0.1,
            enable_blur: true,
            enable_shadow: true,
            reduced_motion: false,
        },
    };
    AnimationConfig {
        reduced_motion: base.reduced_motion || system_reduced_motion,
        ..base
    }
}

impl AnimationConfig {
    /// Crossfade opacity after `elapsed`, eased over [`duration`](Self::duration).
    /// Reduced motion pins the result to 1.0 so content appears immediately.
    pub fn fade_opacity(&self, elapsed: Duration) -> f32 {
        if self.reduced_motion {
            return 1.0;
        }
        if self.duration <= f32::EPSILON {
            return 1.0;
        }
        let fraction = (elapsed.as_secs_f32() / self.duration).clamp(0.0, 1.0);
        Easing::Standard.transform(fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_tier_table_row() {
        let config = resolve(DeviceTier::Low, false);
        assert_eq!(
            config,
            AnimationConfig {
                duration: 0.3,
                stagger_delay: 0.05,
                enable_blur: false,
                enable_shadow: false,
                reduced_motion: true,
            }
        );
    }

    #[test]
    fn medium_tier_table_row() {
        let config = resolve(DeviceTier::Medium, false);
        assert_eq!(config.duration, 0.5);
        assert_eq!(config.stagger_delay, 0.08);
        assert!(config.enable_blur);
        assert!(!config.enable_shadow);
        assert!(!config.reduced_motion);
    }

    #[test]
    fn system_preference_forces_reduced_motion_without_touching_the_rest() {
        let config = resolve(DeviceTier::High, true);
        assert_eq!(config.duration, 0.6);
        assert_eq!(config.stagger_delay, 0.1);
        assert!(config.enable_blur);
        assert!(config.enable_shadow);
        assert!(config.reduced_motion);
    }

    #[test]
    fn one_config_per_pair() {
        assert_eq!(
            resolve(DeviceTier::Medium, true),
            resolve(DeviceTier::Medium, true)
        );
    }

    #[test]
    fn fade_opacity_progresses_and_saturates() {
        let config = resolve(DeviceTier::High, false);
        assert_eq!(config.fade_opacity(Duration::ZERO), 0.0);
        let mid = config.fade_opacity(Duration::from_millis(300));
        assert!(mid > 0.0 && mid < 1.0, "midpoint should be partial: {mid}");
        assert_eq!(config.fade_opacity(Duration::from_secs(1)), 1.0);
    }

    #[test]
    fn fade_opacity_is_immediate_under_reduced_motion() {
        let config = resolve(DeviceTier::Low, false);
        assert_eq!(config.fade_opacity(Duration::ZERO), 1.0);
    }

    #[test]
    fn easing_bounds() {
        for easing in [Easing::Linear, Easing::Standard] {
            assert!(easing.transform(0.0).abs() < 0.01);
            assert!((easing.transform(1.0) - 1.0).abs() < 0.01);
        }
    }

    #[test]
    fn standard_easing_is_monotonic() {
        let mut last = 0.0;
        for step in 0..=20 {
            let value = Easing::Standard.transform(step as f32 / 20.0);
            assert!(value + 1e-4 >= last, "easing regressed at step {step}");
            last = value;
        }
    }
}
