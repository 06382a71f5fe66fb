//! Binance spot REST client implementing the exchange gateway contract.
//!
//! Works against the production API or the spot testnet; signed endpoints
//! use the standard HMAC-SHA256 query signature.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;

use crate::gateway::{ExchangeGateway, GatewayError, SymbolResolver};
use crate::models::{AssetBalance, LotFilter, OrderReport, OrderStatus, Side};

/// Binance spot testnet endpoint
pub const BINANCE_TESTNET_URL: &str = "https://testnet.binance.vision";

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    api_key: String,
    secret_key: String,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TickerPriceResponse {
    price: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    balances: Vec<BalanceEntry>,
}

#[derive(Debug, Deserialize)]
struct BalanceEntry {
    asset: String,
    free: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfoResponse {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    status: String,
    quote_asset: String,
    filters: Vec<RawFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFilter {
    filter_type: String,
    #[serde(default)]
    step_size: Option<String>,
    #[serde(default)]
    min_qty: Option<String>,
    #[serde(default)]
    min_notional: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    status: String,
    executed_qty: String,
    cummulative_quote_qty: String,
}

/// Binance error payload: `{"code": -1121, "msg": "Invalid symbol."}`
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

fn parse_decimal(field: &str, value: &str) -> Result<f64, GatewayError> {
    value
        .parse::<f64>()
        .map_err(|_| GatewayError::Parse(format!("bad {}: {:?}", field, value)))
}

impl BinanceClient {
    pub fn new(base_url: &str, api_key: String, secret_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            secret_key,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// HMAC-SHA256 of the query string, hex encoded.
    fn sign(&self, query: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Append timestamp and signature to a query string.
    fn signed_query(&self, params: &[(&str, String)]) -> String {
        let mut parts: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        parts.push(format!("timestamp={}", Utc::now().timestamp_millis()));

        let query = parts.join("&");
        let signature = self.sign(&query);
        format!("{}&signature={}", query, signature)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(err) => format!("{} (code {})", err.msg, err.code),
            Err(_) => body,
        };
        Err(GatewayError::Api(format!("{}: {}", status, message)))
    }

    async fn exchange_info(&self, symbol: Option<&str>) -> Result<ExchangeInfoResponse, GatewayError> {
        let url = match symbol {
            Some(symbol) => format!("{}/api/v3/exchangeInfo?symbol={}", self.base_url, symbol),
            None => format!("{}/api/v3/exchangeInfo", self.base_url),
        };
        let response = Self::check(self.client.get(&url).send().await?).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ExchangeGateway for BinanceClient {
    async fn account_balances(&self) -> Result<Vec<AssetBalance>, GatewayError> {
        let url = format!(
            "{}/api/v3/account?{}",
            self.base_url,
            self.signed_query(&[])
        );
        let response = Self::check(
            self.client
                .get(&url)
                .header("X-MBX-APIKEY", &self.api_key)
                .send()
                .await?,
        )
        .await?;
        let account: AccountResponse = response.json().await?;

        account
            .balances
            .into_iter()
            .map(|entry| {
                Ok(AssetBalance {
                    free: parse_decimal("free", &entry.free)?,
                    asset: entry.asset,
                })
            })
            .collect()
    }

    async fn price(&self, symbol: &str) -> Result<f64, GatewayError> {
        let url = format!("{}/api/v3/ticker/price?symbol={}", self.base_url, symbol);
        let response = Self::check(self.client.get(&url).send().await?).await?;
        let ticker: TickerPriceResponse = response.json().await?;
        parse_decimal("price", &ticker.price)
    }

    async fn lot_filter(&self, symbol: &str) -> Result<LotFilter, GatewayError> {
        let info = self.exchange_info(Some(symbol)).await?;
        let symbol_info = info
            .symbols
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Parse(format!("no exchange info for {}", symbol)))?;

        // Filters are selected by type; positional indices shift between
        // exchange info revisions.
        let mut step_size = None;
        let mut min_qty = None;
        let mut min_notional = None;
        for filter in &symbol_info.filters {
            match filter.filter_type.as_str() {
                "LOT_SIZE" => {
                    step_size = filter.step_size.as_deref();
                    min_qty = filter.min_qty.as_deref();
                }
                "NOTIONAL" | "MIN_NOTIONAL" => {
                    min_notional = filter.min_notional.as_deref();
                }
                _ => {}
            }
        }

        let missing = |name: &str| GatewayError::Parse(format!("{} missing {}", symbol, name));
        Ok(LotFilter {
            step_size: parse_decimal("stepSize", step_size.ok_or_else(|| missing("LOT_SIZE"))?)?,
            min_qty: parse_decimal("minQty", min_qty.ok_or_else(|| missing("LOT_SIZE"))?)?,
            min_notional: parse_decimal(
                "minNotional",
                min_notional.ok_or_else(|| missing("NOTIONAL"))?,
            )?,
        })
    }

    async fn submit_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
    ) -> Result<OrderReport, GatewayError> {
        let params = [
            ("symbol", symbol.to_string()),
            ("side", side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", format!("{}", quantity)),
        ];
        let url = format!(
            "{}/api/v3/order?{}",
            self.base_url,
            self.signed_query(&params)
        );
        let response = Self::check(
            self.client
                .post(&url)
                .header("X-MBX-APIKEY", &self.api_key)
                .send()
                .await?,
        )
        .await?;
        let order: OrderResponse = response.json().await?;

        let status = match order.status.as_str() {
            "FILLED" => OrderStatus::Filled,
            "REJECTED" => OrderStatus::Rejected,
            "EXPIRED" => OrderStatus::Expired,
            other => OrderStatus::Other(other.to_string()),
        };
        let filled_quantity = parse_decimal("executedQty", &order.executed_qty)?;
        let quote_spent = parse_decimal("cummulativeQuoteQty", &order.cummulative_quote_qty)?;
        let fill_price = if filled_quantity > 0.0 {
            quote_spent / filled_quantity
        } else {
            0.0
        };

        Ok(OrderReport {
            status,
            filled_quantity,
            fill_price,
        })
    }
}

// ---------------------------------------------------------------------------
// Symbol directory
// ---------------------------------------------------------------------------

/// Tradable pairs for one quote asset, loaded from the exchange listing.
/// Resolves raw asset codes ("ETH") to pair ids ("ETHUSDT").
pub struct SymbolDirectory {
    quote_asset: String,
    symbols: HashSet<String>,
}

impl SymbolDirectory {
    /// Load every TRADING pair quoted in `quote_asset`.
    pub async fn load(client: &BinanceClient, quote_asset: &str) -> Result<Self, GatewayError> {
        let info = client.exchange_info(None).await?;
        let symbols = info
            .symbols
            .into_iter()
            .filter(|s| s.status == "TRADING" && s.quote_asset == quote_asset)
            .map(|s| s.symbol)
            .collect();
        Ok(Self {
            quote_asset: quote_asset.to_string(),
            symbols,
        })
    }

    pub fn from_symbols(quote_asset: &str, symbols: impl IntoIterator<Item = String>) -> Self {
        Self {
            quote_asset: quote_asset.to_string(),
            symbols: symbols.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl SymbolResolver for SymbolDirectory {
    fn resolve(&self, base_asset: &str) -> Option<String> {
        if base_asset == self.quote_asset {
            return None;
        }
        let candidate = format!("{}{}", base_asset, self.quote_asset);
        self.symbols.contains(&candidate).then_some(candidate)
    }
}
