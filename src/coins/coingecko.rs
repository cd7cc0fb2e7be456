//! Reqwest-backed CoinGecko adapter for the price list.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

use super::client::{Coin, PriceClientError, PriceListClient};
use crate::config::CoinGeckoConfig;

const USER_AGENT: &str = "coinfolio-backend/0.1";
const MAX_ERROR_BODY_CHARS: usize = 256;

pub struct CoinGeckoClient {
    client: Client,
    markets_url: String,
    vs_currency: String,
}

impl CoinGeckoClient {
    pub fn new(cfg: &CoinGeckoConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            markets_url: markets_url(&cfg.base_url),
            vs_currency: cfg.vs_currency.clone(),
        })
    }
}

#[async_trait]
impl PriceListClient for CoinGeckoClient {
    #[instrument(skip(self), fields(url = %self.markets_url))]
    async fn list(&self) -> Result<Vec<Coin>, PriceClientError> {
        let response = self
            .client
            .get(&self.markets_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[
                ("vs_currency", self.vs_currency.as_str()),
                ("order", "market_cap_desc"),
            ])
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            warn!(%status, "price list request rejected");
            return Err(map_status_error(status, body.as_ref()));
        }

        let coins = parse_coins(body.as_ref())?;
        debug!(count = coins.len(), "price list fetched");
        Ok(coins)
    }
}

fn markets_url(base_url: &str) -> String {
    format!("{}/coins/markets", base_url.trim_end_matches('/'))
}

fn parse_coins(body: &[u8]) -> Result<Vec<Coin>, PriceClientError> {
    serde_json::from_slice(body).map_err(|e| PriceClientError::Decode(e.to_string()))
}

fn map_transport_error(e: reqwest::Error) -> PriceClientError {
    if e.is_timeout() {
        PriceClientError::Transport(format!("timed out: {e}"))
    } else {
        PriceClientError::Transport(e.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> PriceClientError {
    let body: String = String::from_utf8_lossy(body)
        .chars()
        .take(MAX_ERROR_BODY_CHARS)
        .collect();
    PriceClientError::Status {
        status: status.as_u16(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markets_url_tolerates_trailing_slash() {
        assert_eq!(
            markets_url("https://api.coingecko.com/api/v3/"),
            "https://api.coingecko.com/api/v3/coins/markets"
        );
        assert_eq!(
            markets_url("http://localhost:9000"),
            "http://localhost:9000/coins/markets"
        );
    }

    #[test]
    fn parse_coins_keeps_upstream_order_and_ignores_extra_fields() {
        let body = br#"[
            {"id":"bitcoin","symbol":"btc","name":"Bitcoin","current_price":61000.5,"market_cap_rank":1,"total_volume":1},
            {"id":"ethereum","symbol":"eth","name":"Ethereum","image":"https://img/eth.png"},
            {"id":"tether","symbol":"usdt","name":"Tether","current_price":null}
        ]"#;
        let coins = parse_coins(body).expect("valid payload");
        let ids: Vec<&str> = coins.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["bitcoin", "ethereum", "tether"]);
        assert_eq!(coins[0].current_price, Some(61000.5));
        assert_eq!(coins[0].market_cap_rank, Some(1));
        assert_eq!(coins[1].image.as_deref(), Some("https://img/eth.png"));
        assert_eq!(coins[2].current_price, None);
    }

    #[test]
    fn parse_coins_rejects_non_list_payload() {
        let err = parse_coins(br#"{"status":{"error_code":429}}"#).unwrap_err();
        assert!(matches!(err, PriceClientError::Decode(_)));
    }

    #[test]
    fn status_error_truncates_body() {
        let body = "x".repeat(1000);
        match map_status_error(StatusCode::TOO_MANY_REQUESTS, body.as_bytes()) {
            PriceClientError::Status { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body.len(), MAX_ERROR_BODY_CHARS);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
