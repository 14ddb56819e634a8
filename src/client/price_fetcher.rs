use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::error::FetchError;
use crate::oracle::types::Quote;

/// One request per call. Retrying is the caller's business.
#[async_trait]
pub trait QuoteFetcher: Send + Sync {
    async fn fetch(&self) -> Result<Quote, FetchError>;
}

#[derive(Debug, Clone)]
pub struct QuoteSource {
    /// Endpoint without query string, e.g. `https://min-api.cryptocompare.com/data/price`
    pub url: String,
    /// Asset being priced, e.g. `BTC`
    pub base: String,
    /// Response field holding the price, e.g. `USD`
    pub currency: String,
    pub api_key: Option<String>,
}

impl QuoteSource {
    /// Symbol attested on the wire, e.g. `BTCUSD`.
    pub fn symbol(&self) -> String {
        format!("{}{}", self.base, self.currency)
    }
}

pub struct HttpQuoteFetcher {
    client: reqwest::Client,
    source: QuoteSource,
}

impl HttpQuoteFetcher {
    pub fn new(source: QuoteSource, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, source })
    }

    pub fn source(&self) -> &QuoteSource {
        &self.source
    }
}

/// Pulls `field` out of a quote body and truncates it to an integer.
pub fn parse_quote_body(body: &Value, field: &str) -> Result<u64, FetchError> {
    let raw = body
        .get(field)
        .ok_or_else(|| FetchError::MissingField(field.to_string()))?;

    let value = match raw {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| FetchError::InvalidValue(n.to_string()))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| FetchError::InvalidValue(s.clone()))?,
        other => return Err(FetchError::InvalidValue(other.to_string())),
    };

    if !value.is_finite() || value < 0.0 || value >= u64::MAX as f64 {
        return Err(FetchError::InvalidValue(value.to_string()));
    }
    Ok(value.trunc() as u64)
}

#[async_trait]
impl QuoteFetcher for HttpQuoteFetcher {
    async fn fetch(&self) -> Result<Quote, FetchError> {
        let mut params = vec![
            ("fsym", self.source.base.as_str()),
            ("tsyms", self.source.currency.as_str()),
        ];
        if let Some(key) = self.source.api_key.as_deref() {
            params.push(("api_key", key));
        }

        let resp = self
            .client
            .get(&self.source.url)
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Transport(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            return Err(FetchError::Transport(format!("HTTP {}", resp.status())));
        }

        let body: Value = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Decode(e.to_string())
            }
        })?;
        tracing::debug!("Quote response: {}", body);

        let value = parse_quote_body(&body, &self.source.currency)?;
        Ok(Quote::new(self.source.symbol(), value))
    }
}
