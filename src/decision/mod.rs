//! Pluggable decision policy consumed by the run loop.

pub mod threshold;

use async_trait::async_trait;

use crate::models::{Advice, Position};

pub use threshold::ThresholdAdvisor;

/// A decision policy: ranks candidate symbols and advises on individual
/// positions. The engine treats it as a black box; implementations own
/// their indicators, data feeds and failure handling (a provider that
/// cannot decide returns `Neutral` / an empty list rather than erroring).
#[async_trait]
pub trait DecisionProvider: Send + Sync {
    /// Candidate symbols, best first. Refreshed on every call; the run loop
    /// evaluates at most its configured top-K.
    async fn ranked_candidates(&self) -> Vec<String>;

    /// Advice for one position. `position.available_quantity == 0` means the
    /// symbol is merely a candidate, not a holding.
    async fn advice(&self, position: &Position) -> Advice;
}
