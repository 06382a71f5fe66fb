//! The unattended run loop: decision cycles until the session time budget
//! expires, then a final full liquidation.

use std::time::Duration;

use tokio::time::Instant;

use crate::decision::DecisionProvider;
use crate::engine::error::EngineError;
use crate::engine::executor::{TradeOutcome, TradingEngine};
use crate::gateway::GatewayError;
use crate::models::{Advice, Position};

impl TradingEngine {
    /// One full decision-execution cycle.
    ///
    /// Evaluates the top-K ranked candidates, forces a full resync, then
    /// sweeps every held position for sell advice. Failures inside one
    /// symbol are contained and logged; only account-level gateway failures
    /// abort the cycle.
    pub async fn run_cycle(&mut self, provider: &dyn DecisionProvider) -> Result<(), GatewayError> {
        self.reset_if_dirty().await?;

        let top_candidates = self.config().top_candidates;
        let quote_per_order = self.config().quote_per_order;
        let candidates = provider.ranked_candidates().await;

        for symbol in candidates.iter().take(top_candidates) {
            if *symbol == self.config().quote_asset {
                continue;
            }

            if let Some(position) = self.ledger().find(symbol).cloned() {
                match provider.advice(&position).await {
                    Advice::Buy => {
                        let result = self.buy(symbol, quote_per_order).await;
                        log_contained(symbol, result);
                        self.order_gap().await;
                    }
                    Advice::Sell => {
                        let result = self.sell(symbol, None, true).await;
                        log_contained(symbol, result);
                        self.order_gap().await;
                    }
                    Advice::Neutral => {}
                }
            } else {
                // candidate we do not hold: probe with a flat position
                let probe =
                    Position::new(symbol, &self.config().market, &self.config().venue);
                match provider.advice(&probe).await {
                    Advice::Buy => {
                        let result = self.buy(symbol, quote_per_order).await;
                        log_contained(symbol, result);
                        self.order_gap().await;
                    }
                    Advice::Sell => {
                        tracing::warn!("advice to sell {} but nothing is held", symbol);
                    }
                    Advice::Neutral => {}
                }
            }
        }

        // Unconditional resync: picks up exchange-side balance changes the
        // dirty flag cannot know about.
        self.resync().await?;

        for symbol in self.ledger().held_symbols() {
            let Some(position) = self.ledger().find(&symbol).cloned() else {
                continue;
            };
            // Buy advice on already-held positions is deliberately not
            // re-executed here; only exits are swept.
            if provider.advice(&position).await == Advice::Sell {
                let result = self.sell(&symbol, None, true).await;
                log_contained(&symbol, result);
                self.order_gap().await;
            }
        }

        Ok(())
    }

    /// Run cycles until `min_duration` has elapsed, then liquidate
    /// everything. The duration check at the end of each cycle is the only
    /// cancellation point.
    pub async fn run(
        &mut self,
        provider: &dyn DecisionProvider,
        min_duration: Duration,
    ) -> Result<(), GatewayError> {
        let started = Instant::now();
        loop {
            tracing::info!("new decision cycle");
            self.run_cycle(provider).await?;

            if started.elapsed() >= min_duration {
                break;
            }
        }
        self.liquidate_all().await
    }

    /// Force-sell every held position unconditionally.
    pub async fn liquidate_all(&mut self) -> Result<(), GatewayError> {
        tracing::info!("session over, liquidating all positions");
        self.reset_if_dirty().await?;

        for symbol in self.ledger().held_symbols() {
            let result = self.sell(&symbol, None, true).await;
            log_contained(&symbol, result);
            self.order_gap().await;
        }
        Ok(())
    }

    /// Best-estimate total equity in quote currency: quote balance plus
    /// every held position at its live price. Explicitly stale between a
    /// fill and the next reconciliation.
    pub async fn total_equity(&self) -> Result<f64, GatewayError> {
        let mut equity = self.ledger().quote().available_quantity;
        for position in self.ledger().positions() {
            if !position.is_held() {
                continue;
            }
            let price = self.gateway().price(&position.symbol).await?;
            equity += position.available_quantity * price;
        }
        Ok(equity)
    }

    async fn order_gap(&self) {
        tokio::time::sleep(self.config().order_gap).await;
    }
}

/// Per-symbol containment: anything short of an account-level failure is
/// logged and the cycle moves on.
fn log_contained(symbol: &str, result: Result<TradeOutcome, EngineError>) {
    match result {
        Ok(TradeOutcome::Filled { quantity, price }) => {
            tracing::debug!("{}: filled {:.8} at {:.8}", symbol, quantity, price);
        }
        Ok(outcome) => {
            tracing::info!("{}: {:?}", symbol, outcome);
        }
        Err(e) => {
            tracing::warn!("{}: {}", symbol, e);
        }
    }
}
