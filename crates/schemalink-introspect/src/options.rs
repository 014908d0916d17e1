use serde::{Deserialize, Serialize};

use schemalink_core::{InferenceConfig, NormalizePolicy};

/// Options that control how value sampling behaves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingOptions {
    pub enabled: bool,
    /// Maximum values fetched per column.
    pub limit: u32,
    /// Per-column timeout in milliseconds.
    pub timeout_ms: u64,
    /// Columns sampled at the same time.
    pub concurrency: usize,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 1000,
            timeout_ms: 5_000,
            concurrency: 4,
        }
    }
}

/// Everything [`crate::discover`] needs besides the source itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverOptions {
    pub normalize: NormalizePolicy,
    pub inference: InferenceConfig,
    pub sampling: SamplingOptions,
}
