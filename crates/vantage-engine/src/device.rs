//! Device tier classification.
//!
//! Reads the resolved capability descriptor and produces a coarse
//! performance tier. Pure and re-invokable at any time (for example after a
//! network-change notification); prior results are never mutated in place.

use vantage_core::{EffectiveConnection, HostCapabilities};

/// Assumed concurrency units when the host does not report them.
const DEFAULT_CONCURRENCY: u32 = 4;

/// Assumed device memory in GB when the host does not report it.
const DEFAULT_MEMORY_GB: f32 = 4.0;

/// Coarse classification of client compute and network capability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceTier {
    Low,
    Medium,
    High,
}

/// Classifies the device from its capability signals.
///
/// Rules are evaluated in order, first match wins; an absent signal assumes
/// a mid-range device (4 units, 4 GB, 4g). Two cores force `Low` even on a
/// machine with excellent memory and network.
pub fn classify(capabilities: &HostCapabilities) -> DeviceTier {
    let concurrency = capabilities
        .hardware_concurrency
        .unwrap_or(DEFAULT_CONCURRENCY);
    let memory_gb = capabilities.device_memory_gb.unwrap_or(DEFAULT_MEMORY_GB);
    let network = capabilities
        .network
        .unwrap_or(EffectiveConnection::Cell4g);

    if concurrency <= 2
        || memory_gb <= 2.0
        || matches!(
            network,
            EffectiveConnection::Slow2g | EffectiveConnection::Cell2g
        )
    {
        DeviceTier::Low
    } else if concurrency <= 4 || memory_gb <= 4.0 || network == EffectiveConnection::Cell3g {
        DeviceTier::Medium
    } else {
        DeviceTier::High
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(
        concurrency: Option<u32>,
        memory_gb: Option<f32>,
        network: Option<EffectiveConnection>,
    ) -> HostCapabilities {
        HostCapabilities {
            hardware_concurrency: concurrency,
            device_memory_gb: memory_gb,
            network,
            prefers_reduced_motion: false,
        }
    }

    #[test]
    fn absent_signals_assume_mid_range() {
        // 4 cores / 4 GB / 4g lands on the Medium boundary.
        assert_eq!(classify(&HostCapabilities::default()), DeviceTier::Medium);
    }

    #[test]
    fn low_tier_rules() {
        assert_eq!(
            classify(&caps(Some(2), Some(16.0), Some(EffectiveConnection::Cell4g))),
            DeviceTier::Low
        );
        assert_eq!(
            classify(&caps(Some(8), Some(2.0), Some(EffectiveConnection::Cell4g))),
            DeviceTier::Low
        );
        assert_eq!(
            classify(&caps(Some(8), Some(16.0), Some(EffectiveConnection::Slow2g))),
            DeviceTier::Low
        );
        assert_eq!(
            classify(&caps(Some(8), Some(16.0), Some(EffectiveConnection::Cell2g))),
            DeviceTier::Low
        );
    }

    #[test]
    fn low_takes_precedence_over_medium() {
        // Cores force Low even though memory alone would say Medium.
        assert_eq!(
            classify(&caps(Some(1), Some(4.0), Some(EffectiveConnection::Cell3g))),
            DeviceTier::Low
        );
    }

    #[test]
    fn medium_tier_rules() {
        assert_eq!(
            classify(&caps(Some(4), Some(16.0), Some(EffectiveConnection::Cell4g))),
            DeviceTier::Medium
        );
        assert_eq!(
            classify(&caps(Some(8), Some(4.0), Some(EffectiveConnection::Cell4g))),
            DeviceTier::Medium
        );
        assert_eq!(
            classify(&caps(Some(8), Some(16.0), Some(EffectiveConnection::Cell3g))),
            DeviceTier::Medium
        );
    }

    #[test]
    fn high_tier_otherwise() {
        assert_eq!(
            classify(&caps(Some(8), Some(16.0), Some(EffectiveConnection::Cell4g))),
            DeviceTier::High
        );
    }

    #[test]
    fn classification_is_pure() {
        let capabilities = caps(Some(8), Some(8.0), Some(EffectiveConnection::Cell4g));
        let first = classify(&capabilities);
        let second = classify(&capabilities);
        assert_eq!(first, second);
    }
}
