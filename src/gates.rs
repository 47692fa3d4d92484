//! Stage quality gates for the knowledge base.
//!
//! Fixed thresholds consumed by external metrics and reporting; keeping
//! them in one place prevents the console, scripts, and service from
//! drifting apart. The core exposes them but never enforces them inline.

use serde::{Deserialize, Serialize};

/// Minimum acceptable search hit ratio.
pub const SEARCH_HIT_RATIO_MIN: f64 = 0.70;
/// Minimum acceptable answer citation ratio.
pub const ASK_CITATION_RATIO_MIN: f64 = 0.95;
/// Maximum acceptable review latency P95, in milliseconds.
pub const REVIEW_LATENCY_P95_MS_MAX: u64 = 800;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityGates {
    pub search_hit_ratio_min: f64,
    pub ask_citation_ratio_min: f64,
    pub review_latency_p95_ms_max: u64,
}

impl Default for QualityGates {
    fn default() -> Self {
        Self {
            search_hit_ratio_min: SEARCH_HIT_RATIO_MIN,
            ask_citation_ratio_min: ASK_CITATION_RATIO_MIN,
            review_latency_p95_ms_max: REVIEW_LATENCY_P95_MS_MAX,
        }
    }
}
