//! Client driver: post a random dataset row to the prediction API

use anyhow::{Context, Result};
use colored::Colorize;
use pipeline_lib::{read_dataset, PipelineConfig, PipelineLogger};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;

use crate::client::PredictionClient;
use crate::output::OutputFormat;

/// Which configured endpoint to call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMode {
    Local,
    Remote,
}

impl ApiMode {
    pub fn url<'a>(&self, config: &'a PipelineConfig) -> &'a str {
        match self {
            ApiMode::Local => &config.api.local_url,
            ApiMode::Remote => &config.api.remote_url,
        }
    }
}

/// The features that were sent and what the API answered
#[derive(Debug, Clone)]
pub struct Exchange {
    pub features: Vec<f64>,
    pub response: Value,
}

/// Sample one row, strip the label, post it, and return the response
pub async fn predict<R: Rng + ?Sized>(config: &PipelineConfig, mode: ApiMode, rng: &mut R) -> Result<Exchange> {
    let url = mode.url(config);
    let client = PredictionClient::new(url)?;

    let dataset = read_dataset(config).context("Failed to read dataset")?;
    let features = dataset
        .sample_features(rng)
        .context("Dataset has no rows to sample")?;

    PipelineLogger::new("client").log_client_request(url, &features);

    let response = client.predict(&features).await?;
    Ok(Exchange { features, response })
}

/// Run the driver and print the URL, the features and the response
pub async fn run(config: &PipelineConfig, mode: ApiMode, format: OutputFormat) -> Result<()> {
    let url = mode.url(config);
    let mut rng = StdRng::from_entropy();
    let exchange = predict(config, mode, &mut rng).await?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "url": url,
                "features": exchange.features,
                "result": exchange.response,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            println!("{} {}", "API URL:".bold(), url.cyan());
            println!("{} {:?}", "FEATURES:".bold(), exchange.features);
            println!("{} {}", "RESULT:".bold(), exchange.response);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha8Rng;
    use serde_json::json;
    use tempfile::TempDir;

    fn config_for(dir: &TempDir, local_url: &str) -> PipelineConfig {
        let csv_path = dir.path().join("diabetes.csv");
        std::fs::write(
            &csv_path,
            "6,148,72,35,0,33.6,0.627,50,1\n1,85,66,29,0,26.6,0.351,31,0\n8,183,64,0,0,23.3,0.672,32,1\n",
        )
        .unwrap();

        let yaml = format!(
            r#"
dataset:
  path: {}
  names: [preg, plas, pres, skin, test, mass, pedi, age, class]
storage:
  backend: local
api:
  local_url: {}
  remote_url: http://prediction-api.invalid:5000/predict
"#,
            csv_path.display(),
            local_url
        );
        PipelineConfig::from_yaml_str(&yaml).unwrap()
    }

    #[tokio::test]
    async fn test_predict_against_mock_api() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/predict")
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"prediction": [1]}"#)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let config = config_for(&dir, &format!("{}/predict", server.url()));
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let exchange = predict(&config, ApiMode::Local, &mut rng).await.unwrap();

        assert_eq!(exchange.response["prediction"], json!([1]));
        assert_eq!(exchange.features.len(), 8);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_posts_eight_features() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/predict")
            .match_body(mockito::Matcher::Regex(r"^\[([^,\]]+,){7}[^,\]]+\]$".to_string()))
            .with_status(200)
            .with_body(r#"{"prediction": 0}"#)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let config = config_for(&dir, &format!("{}/predict", server.url()));
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let exchange = predict(&config, ApiMode::Local, &mut rng).await.unwrap();
        assert_eq!(exchange.response, json!({"prediction": 0}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/predict")
            .with_status(400)
            .with_body(r#"{"error": "expected 8 features"}"#)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let config = config_for(&dir, &format!("{}/predict", server.url()));
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let err = predict(&config, ApiMode::Local, &mut rng).await.unwrap_err();
        assert!(err.to_string().contains("400"));
    }

    #[test]
    fn test_mode_selects_url() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir, "http://localhost:5000/predict");

        assert_eq!(ApiMode::Local.url(&config), "http://localhost:5000/predict");
        assert_eq!(
            ApiMode::Remote.url(&config),
            "http://prediction-api.invalid:5000/predict"
        );
    }
}
