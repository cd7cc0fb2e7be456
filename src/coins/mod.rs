pub mod client;
pub mod coingecko;

pub use client::{Coin, PriceClientError, PriceListClient};
pub use coingecko::CoinGeckoClient;
