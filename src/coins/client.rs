use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One entry of the external price list. Field set mirrors the
/// CoinGecko markets payload; unknown fields are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coin {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum PriceClientError {
    #[error("price list request failed: {0}")]
    Transport(String),
    #[error("price list returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("price list payload could not be decoded: {0}")]
    Decode(String),
}

/// Source of purchasable coins, in the order the provider ranks them.
#[async_trait]
pub trait PriceListClient: Send + Sync {
    async fn list(&self) -> Result<Vec<Coin>, PriceClientError>;
}
