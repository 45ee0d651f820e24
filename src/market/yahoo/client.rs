use async_trait::async_trait;

use crate::market::{
    client::QuoteSource, error::MarketError, rate_limiter::QuoteRateLimiter,
};

use super::types::ChartResponse;

const BASE_URL: &str = "https://query1.finance.yahoo.com";
const CHART_ENDPOINT: &str = "/v8/finance/chart";

// Yahoo rejects requests without a browser-ish user agent.
const USER_AGENT: &str = "Mozilla/5.0 (compatible; zonewatch/0.3)";

pub struct YahooQuoteClient {
    base_url: String,
    http_client: reqwest::Client,
    rate_limiter: QuoteRateLimiter,
}

impl YahooQuoteClient {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL.to_string())
    }

    /// Point the client at a different host, for tests against a local stub.
    pub fn with_base_url(base_url: String) -> Self {
        Self {
            base_url,
            http_client: reqwest::Client::new(),
            // Unauthenticated endpoint, stay well under Yahoo's throttle
            rate_limiter: QuoteRateLimiter::new(2, 4),
        }
    }

    async fn fetch_chart(&self, symbol: &str) -> Result<ChartResponse, MarketError> {
        self.rate_limiter.acquire().await;

        let url = format!(
            "{}{}/{}?range=1d&interval=1d",
            self.base_url, CHART_ENDPOINT, symbol
        );

        let response = self
            .http_client
            .get(&url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<ChartResponse>().await?)
    }
}

impl Default for YahooQuoteClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the latest close out of a chart response. The close series carries a
/// null per missing bar, so take the last non-null value and fall back to the
/// meta price when the series is empty.
pub fn extract_latest_close(response: &ChartResponse, symbol: &str) -> Result<f64, MarketError> {
    if let Some(error) = &response.chart.error {
        return Err(MarketError::Api {
            symbol: symbol.to_string(),
            code: error.code.clone(),
            message: error.description.clone(),
        });
    }

    let result = response
        .chart
        .result
        .as_ref()
        .and_then(|r| r.first())
        .ok_or_else(|| MarketError::NoData(symbol.to_string()))?;

    let series_close = result
        .indicators
        .quote
        .first()
        .and_then(|q| q.close.iter().rev().find_map(|c| *c));

    let close = series_close
        .or(result.meta.regular_market_price)
        .ok_or_else(|| MarketError::NoData(symbol.to_string()))?;

    Ok(round2(close))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[async_trait]
impl QuoteSource for YahooQuoteClient {
    fn source_name(&self) -> &str {
        "yahoo"
    }

    async fn latest_close(&self, symbol: &str) -> Result<f64, MarketError> {
        let response = self.fetch_chart(symbol).await?;
        extract_latest_close(&response, symbol)
    }
}
