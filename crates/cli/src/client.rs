//! HTTP client for the prediction API

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use url::Url;

/// Client for a single prediction endpoint
pub struct PredictionClient {
    client: Client,
    url: Url,
}

impl PredictionClient {
    /// Create a client for the given `/predict` URL
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let url = Url::parse(url).context("Invalid API URL")?;

        Ok(Self { client, url })
    }

    /// POST a JSON body and return the JSON response as-is
    pub async fn predict<B: Serialize + ?Sized>(&self, body: &B) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(self.url.clone())
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }
}
