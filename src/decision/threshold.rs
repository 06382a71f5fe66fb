//! Cost-basis threshold advisor: cut losses at -5%, take profit at +1%.
//!
//! A deliberately small reference policy. It never initiates entries (flat
//! positions get `Neutral`); host processes wanting entry signals plug in
//! their own `DecisionProvider`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::decision::DecisionProvider;
use crate::gateway::ExchangeGateway;
use crate::models::{Advice, Position};

/// Price drop below cost basis that triggers a cut-loss sell
pub const CUT_LOSS_PCT: f64 = 0.05;
/// Price rise above cost basis that triggers a take-profit sell
pub const TAKE_PROFIT_PCT: f64 = 0.01;

pub struct ThresholdAdvisor {
    gateway: Arc<dyn ExchangeGateway>,
    candidates: Vec<String>,
}

impl ThresholdAdvisor {
    /// `candidates` is a static ranked watch list, best first.
    pub fn new(gateway: Arc<dyn ExchangeGateway>, candidates: Vec<String>) -> Self {
        Self {
            gateway,
            candidates,
        }
    }
}

#[async_trait]
impl DecisionProvider for ThresholdAdvisor {
    async fn ranked_candidates(&self) -> Vec<String> {
        self.candidates.clone()
    }

    async fn advice(&self, position: &Position) -> Advice {
        if !position.is_held() || position.cost_basis_price <= 0.0 {
            return Advice::Neutral;
        }

        let price = match self.gateway.price(&position.symbol).await {
            Ok(price) => price,
            Err(e) => {
                tracing::warn!("price lookup failed for {}: {}", position.symbol, e);
                return Advice::Neutral;
            }
        };

        if price < position.cost_basis_price * (1.0 - CUT_LOSS_PCT) {
            tracing::info!(
                "cut loss {}: {:.8} under basis {:.8}",
                position.symbol,
                price,
                position.cost_basis_price
            );
            return Advice::Sell;
        }

        if price > position.cost_basis_price * (1.0 + TAKE_PROFIT_PCT) {
            tracing::info!(
                "take profit {}: {:.8} over basis {:.8}",
                position.symbol,
                price,
                position.cost_basis_price
            );
            return Advice::Sell;
        }

        Advice::Neutral
    }
}
