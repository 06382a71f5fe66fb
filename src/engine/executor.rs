//! Execution engine: turns buy/sell intents into gateway calls and ledger
//! updates, including the bounded force-sell top-up protocol.

use std::sync::Arc;
use std::time::Duration;

use crate::engine::error::EngineError;
use crate::engine::ledger::PositionLedger;
use crate::engine::reconcile::{merge_cost_basis, Reconciler, BALANCE_EPSILON};
use crate::engine::sizing::{size_buy, size_sell, SellSizing};
use crate::gateway::{ExchangeGateway, GatewayError, SymbolResolver};
use crate::models::{OrderStatus, Position, Side};

/// Engine parameters. Defaults mirror a Binance spot USDT account.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Asset every pair is quoted in, e.g. "USDT"
    pub quote_asset: String,
    pub market: String,
    pub venue: String,
    /// Quote amount spent per individual buy order
    pub quote_per_order: f64,
    /// Pause between consecutive order submissions (exchange rate limits)
    pub order_gap: Duration,
    /// How many ranked candidates a cycle evaluates
    pub top_candidates: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quote_asset: "USDT".to_string(),
            market: "crypto".to_string(),
            venue: "BINANCE".to_string(),
            quote_per_order: 1.0,
            order_gap: Duration::from_millis(10),
            top_candidates: 20,
        }
    }
}

/// What became of one buy/sell request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TradeOutcome {
    Filled { quantity: f64, price: f64 },
    /// The gateway rejected the order or failed mid-flight. Logged, ledger
    /// untouched, dirty flag set.
    Rejected,
    /// Sizing could not clear the exchange minimum and no force-sell was
    /// requested; the action was skipped.
    BelowMinimum,
    /// The force-sell retry bound was exhausted; the position is left for
    /// the next cycle.
    Unliquidatable,
}

/// The trading engine proper.
///
/// Strictly sequential: no two orders are ever in flight concurrently, and
/// the ledger is only touched between gateway calls, never during one.
pub struct TradingEngine {
    gateway: Arc<dyn ExchangeGateway>,
    resolver: Arc<dyn SymbolResolver>,
    ledger: PositionLedger,
    reconciler: Reconciler,
    config: EngineConfig,
}

impl TradingEngine {
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        resolver: Arc<dyn SymbolResolver>,
        config: EngineConfig,
    ) -> Self {
        let ledger = PositionLedger::new(&config.quote_asset, &config.market, &config.venue);
        Self {
            gateway,
            resolver,
            ledger,
            reconciler: Reconciler::new(),
            config,
        }
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn gateway(&self) -> &Arc<dyn ExchangeGateway> {
        &self.gateway
    }

    pub fn is_dirty(&self) -> bool {
        self.reconciler.is_dirty()
    }

    /// Full resync of the ledger from the exchange's authoritative balances.
    ///
    /// The gateway does not report cost basis, so fresh positions default
    /// their bought price to the current market price; the merge step then
    /// copies every positive cost basis over from the previous snapshot.
    pub async fn resync(&mut self) -> Result<(), GatewayError> {
        let balances = self.gateway.account_balances().await?;

        let mut quote =
            Position::new(&self.config.quote_asset, &self.config.market, &self.config.venue);
        let mut fresh = Vec::new();

        for balance in balances {
            if balance.free <= BALANCE_EPSILON {
                continue;
            }
            if balance.asset == self.config.quote_asset {
                quote.available_quantity = balance.free;
                continue;
            }
            let Some(symbol) = self.resolver.resolve(&balance.asset) else {
                tracing::debug!("no tradable pair for asset {}, skipping", balance.asset);
                continue;
            };
            let price = self.gateway.price(&symbol).await?;

            let mut position = Position::new(&symbol, &self.config.market, &self.config.venue);
            position.available_quantity = balance.free;
            position.cost_basis_price = price;
            fresh.push(position);
        }

        merge_cost_basis(self.ledger.positions(), &mut fresh);
        self.ledger.set_quote(quote);
        self.ledger.replace_positions(fresh);
        self.reconciler.clear();

        tracing::debug!(
            "resynced ledger: {} positions, {:.8} {}",
            self.ledger.positions().len(),
            self.ledger.quote().available_quantity,
            self.config.quote_asset
        );
        Ok(())
    }

    /// Resync only when a fill or failed order has flagged the ledger stale.
    pub async fn reset_if_dirty(&mut self) -> Result<(), GatewayError> {
        if self.reconciler.is_dirty() {
            self.resync().await?;
        }
        Ok(())
    }

    /// Buy `desired_quote` worth of `symbol` at market.
    ///
    /// The spend is floored at the exchange minimum notional plus margin, so
    /// small requests still produce a valid order.
    pub async fn buy(&mut self, symbol: &str, desired_quote: f64) -> Result<TradeOutcome, EngineError> {
        self.reset_if_dirty().await?;

        let price = self.gateway.price(symbol).await?;
        let filter = self.gateway.lot_filter(symbol).await?;
        let order = size_buy(desired_quote, price, &filter);

        let available = self.ledger.quote().available_quantity;
        if available < order.required_quote {
            return Err(EngineError::InsufficientQuoteBalance {
                quote_asset: self.config.quote_asset.clone(),
                available,
                required: order.required_quote,
            });
        }

        tracing::info!(
            "BUY {} at {:.8}: qty {:.8}, notional {:.8}",
            symbol,
            price,
            order.quantity,
            order.projected_notional
        );
        self.submit(symbol, Side::Buy, order.quantity).await
    }

    /// Sell `quantity` of `symbol` at market; `None` sells the full holding.
    ///
    /// With `force_sell`, a position too small to clear the exchange minimum
    /// is first topped up with a minimum-notional buy and the sell retried
    /// exactly once; the retry liquidates the full topped-up holding even
    /// when the original request was partial. An explicit attempt counter
    /// bounds the retry; if the retried sell is still below minimum the
    /// position is reported unliquidatable and left for the next cycle.
    pub async fn sell(
        &mut self,
        symbol: &str,
        quantity: Option<f64>,
        force_sell: bool,
    ) -> Result<TradeOutcome, EngineError> {
        for attempt in 0..=1 {
            self.reset_if_dirty().await?;

            let available = self
                .ledger
                .find(symbol)
                .ok_or_else(|| EngineError::PositionNotFound(symbol.to_string()))?
                .available_quantity;
            // the retry after a top-up liquidates the whole holding; a
            // partial request only applies to the first attempt
            let requested = if attempt == 0 {
                quantity.unwrap_or(available)
            } else {
                available
            };

            let price = self.gateway.price(symbol).await?;
            let filter = self.gateway.lot_filter(symbol).await?;

            match size_sell(symbol, requested, available, price, &filter)? {
                SellSizing::BelowMinimum {
                    quantity: sized,
                    projected_notional,
                } => {
                    if !force_sell {
                        tracing::info!(
                            "skipping sell of {}: qty {:.8} / notional {:.8} below exchange minimum",
                            symbol,
                            sized,
                            projected_notional
                        );
                        return Ok(TradeOutcome::BelowMinimum);
                    }
                    if attempt > 0 {
                        tracing::warn!(
                            "{} still below exchange minimum after top-up, leaving for next cycle",
                            symbol
                        );
                        return Ok(TradeOutcome::Unliquidatable);
                    }

                    // Exchanges reject liquidation orders under their dust
                    // threshold; buy the position up over the floor first.
                    tracing::warn!("force buy {}: topping up dust position before sell", symbol);
                    let topup = self.config.quote_per_order;
                    self.buy(symbol, topup).await?;
                    tokio::time::sleep(self.config.order_gap).await;
                }
                SellSizing::Order {
                    quantity: sell_quantity,
                    projected_notional,
                } => {
                    tracing::info!(
                        "SELL {} at {:.8}: qty {:.8}, notional {:.8}",
                        symbol,
                        price,
                        sell_quantity,
                        projected_notional
                    );
                    return self.submit(symbol, Side::Sell, sell_quantity).await;
                }
            }
        }

        Ok(TradeOutcome::Unliquidatable)
    }

    /// Submit a market order and apply the fill to the ledger.
    ///
    /// Gateway failures and non-filled statuses are contained here: logged,
    /// ledger untouched, dirty flag set so the next cycle resyncs from
    /// ground truth.
    async fn submit(&mut self, symbol: &str, side: Side, quantity: f64) -> Result<TradeOutcome, EngineError> {
        let result = self.gateway.submit_market_order(symbol, side, quantity).await;
        self.reconciler.mark_dirty();

        match result {
            Ok(report) if report.status == OrderStatus::Filled => {
                self.ledger
                    .upsert_after_fill(symbol, side, report.filled_quantity, report.fill_price);
                let notional = report.filled_quantity * report.fill_price;
                match side {
                    Side::Buy => self.ledger.debit_quote(notional),
                    Side::Sell => self.ledger.credit_quote(notional),
                }
                tracing::info!(
                    "{} {} filled: {:.8} at {:.8}",
                    side.as_str(),
                    symbol,
                    report.filled_quantity,
                    report.fill_price
                );
                Ok(TradeOutcome::Filled {
                    quantity: report.filled_quantity,
                    price: report.fill_price,
                })
            }
            Ok(report) => {
                tracing::warn!("{} {} not filled: {:?}", side.as_str(), symbol, report.status);
                Ok(TradeOutcome::Rejected)
            }
            Err(e) => {
                tracing::warn!("{} {} failed at gateway: {}", side.as_str(), symbol, e);
                Ok(TradeOutcome::Rejected)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::gateway::{ExchangeGateway, GatewayError, SymbolResolver};
    use crate::models::{AssetBalance, LotFilter, OrderReport, OrderStatus, Side};

    /// Deterministic in-memory exchange. Fills every market order at the
    /// scripted price and mutates its own balances so resyncs see the fill.
    pub struct FakeExchange {
        pub balances: Mutex<HashMap<String, f64>>,
        pub prices: Mutex<HashMap<String, f64>>,
        pub filters: Mutex<HashMap<String, LotFilter>>,
        pub calls: Mutex<Vec<String>>,
        pub reject_orders: Mutex<bool>,
    }

    impl FakeExchange {
        pub fn new() -> Self {
            Self {
                balances: Mutex::new(HashMap::new()),
                prices: Mutex::new(HashMap::new()),
                filters: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
                reject_orders: Mutex::new(false),
            }
        }

        pub fn set_balance(&self, asset: &str, free: f64) {
            self.balances.lock().unwrap().insert(asset.to_string(), free);
        }

        pub fn set_price(&self, symbol: &str, price: f64) {
            self.prices.lock().unwrap().insert(symbol.to_string(), price);
        }

        pub fn set_filter(&self, symbol: &str, filter: LotFilter) {
            self.filters.lock().unwrap().insert(symbol.to_string(), filter);
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self, prefix: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.starts_with(prefix))
                .count()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn base_asset(symbol: &str) -> &str {
            symbol.strip_suffix("USDT").unwrap_or(symbol)
        }
    }

    #[async_trait]
    impl ExchangeGateway for FakeExchange {
        async fn account_balances(&self) -> Result<Vec<AssetBalance>, GatewayError> {
            self.record("account".to_string());
            Ok(self
                .balances
                .lock()
                .unwrap()
                .iter()
                .map(|(asset, free)| AssetBalance {
                    asset: asset.clone(),
                    free: *free,
                })
                .collect())
        }

        async fn price(&self, symbol: &str) -> Result<f64, GatewayError> {
            self.record(format!("price {}", symbol));
            self.prices
                .lock()
                .unwrap()
                .get(symbol)
                .copied()
                .ok_or_else(|| GatewayError::Api(format!("unknown symbol {}", symbol)))
        }

        async fn lot_filter(&self, symbol: &str) -> Result<LotFilter, GatewayError> {
            self.record(format!("filter {}", symbol));
            self.filters
                .lock()
                .unwrap()
                .get(symbol)
                .copied()
                .ok_or_else(|| GatewayError::Api(format!("unknown symbol {}", symbol)))
        }

        async fn submit_market_order(
            &self,
            symbol: &str,
            side: Side,
            quantity: f64,
        ) -> Result<OrderReport, GatewayError> {
            self.record(format!("order {} {} {:.8}", side.as_str(), symbol, quantity));

            if *self.reject_orders.lock().unwrap() {
                return Ok(OrderReport {
                    status: OrderStatus::Rejected,
                    filled_quantity: 0.0,
                    fill_price: 0.0,
                });
            }

            let price = *self
                .prices
                .lock()
                .unwrap()
                .get(symbol)
                .ok_or_else(|| GatewayError::Api(format!("unknown symbol {}", symbol)))?;

            let mut balances = self.balances.lock().unwrap();
            let base = Self::base_asset(symbol).to_string();
            let notional = quantity * price;
            match side {
                Side::Buy => {
                    *balances.entry(base).or_insert(0.0) += quantity;
                    *balances.entry("USDT".to_string()).or_insert(0.0) -= notional;
                }
                Side::Sell => {
                    *balances.entry(base).or_insert(0.0) -= quantity;
                    *balances.entry("USDT".to_string()).or_insert(0.0) += notional;
                }
            }

            Ok(OrderReport {
                status: OrderStatus::Filled,
                filled_quantity: quantity,
                fill_price: price,
            })
        }
    }

    /// Resolves any asset with a known pair to "<ASSET>USDT".
    pub struct SuffixResolver;

    impl SymbolResolver for SuffixResolver {
        fn resolve(&self, base_asset: &str) -> Option<String> {
            if base_asset == "USDT" {
                None
            } else {
                Some(format!("{}USDT", base_asset))
            }
        }
    }
}
