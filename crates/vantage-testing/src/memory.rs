//! Stub memory probe.

use vantage_core::{MemoryProbe, MemorySample};

/// A [`MemoryProbe`] returning a fixed sample, or `None` to model a host
/// without memory introspection.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedMemoryProbe {
    sample: Option<MemorySample>,
}

impl FixedMemoryProbe {
    pub fn reporting(used_mb: u32, total_mb: u32) -> Self {
        Self {
            sample: Some(MemorySample { used_mb, total_mb }),
        }
    }

    pub fn unavailable() -> Self {
        Self { sample: None }
    }
}

impl MemoryProbe for FixedMemoryProbe {
    fn sample(&self) -> Option<MemorySample> {
        self.sample
    }
}
