//! Training command: read, split, fit, evaluate, publish

use anyhow::{Context, Result};
use colored::Colorize;
use pipeline_lib::{
    build_store, run_training, save_model_to_store, ObjectStore, PipelineConfig, PipelineLogger,
    PublishReceipt, TrainingReport,
};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use crate::output::{color_accuracy, format_bytes, print_info, print_success, print_warning, OutputFormat};

/// Row for the training summary table
#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Serialize)]
struct TrainingSummary<'a> {
    accuracy: f64,
    train_rows: usize,
    test_rows: usize,
    features: usize,
    published: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    local_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    checksum: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    publish_error: Option<String>,
}

/// Train a model and publish it to the configured store
pub async fn train(config: &PipelineConfig, allow_publish_failure: bool, format: OutputFormat) -> Result<()> {
    let store = build_store(&config.storage)
        .await
        .context("Failed to initialise artifact store")?;

    train_with_store(config, store.as_ref(), allow_publish_failure, format).await
}

/// Train a model and publish it to `store`
///
/// A failed publish aborts with an error unless `allow_publish_failure`
/// is set, in which case it is reported as a warning.
pub async fn train_with_store(
    config: &PipelineConfig,
    store: &dyn ObjectStore,
    allow_publish_failure: bool,
    format: OutputFormat,
) -> Result<()> {
    let logger = PipelineLogger::new("trainer");

    let training_config = config.clone();
    let report = tokio::task::spawn_blocking(move || run_training(&training_config))
        .await
        .context("Training task panicked")?
        .context("Training failed")?;
    logger.log_training_completed(report.accuracy, report.train_rows, report.test_rows);

    let (receipt, publish_error) = match save_model_to_store(&report.model, config, store).await {
        Ok(receipt) => (Some(receipt), None),
        Err(e) if allow_publish_failure => {
            logger.log_publish_skipped(&e.to_string());
            (None, Some(e.to_string()))
        }
        Err(e) => return Err(e).context("Failed to publish model"),
    };

    match format {
        OutputFormat::Json => {
            let summary = summarize(&report, receipt.as_ref(), publish_error);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Table => {
            print_success(&format!("Model is trained. Accuracy: {}", color_accuracy(report.accuracy)));
            println!("{}", summary_table(&report, receipt.as_ref()));

            match (&receipt, &publish_error) {
                (Some(receipt), _) => print_success(&format!(
                    "Model uploaded to {} as {}",
                    receipt.location,
                    receipt.key.cyan()
                )),
                (None, Some(error)) => {
                    print_warning(&format!("Publish failed, continuing: {}", error));
                }
                (None, None) => print_info("Model was not published"),
            }
        }
    }

    Ok(())
}

fn summarize<'a>(
    report: &TrainingReport,
    receipt: Option<&'a PublishReceipt>,
    publish_error: Option<String>,
) -> TrainingSummary<'a> {
    TrainingSummary {
        accuracy: report.accuracy,
        train_rows: report.train_rows,
        test_rows: report.test_rows,
        features: report.model.n_features(),
        published: receipt.is_some(),
        key: receipt.map(|r| r.key.as_str()),
        location: receipt.map(|r| r.location.as_str()),
        local_path: receipt.map(|r| r.local_path.display().to_string()),
        checksum: receipt.map(|r| r.checksum.as_str()),
        publish_error,
    }
}

fn summary_table(report: &TrainingReport, receipt: Option<&PublishReceipt>) -> String {
    let mut rows = vec![
        SummaryRow {
            field: "Train rows",
            value: report.train_rows.to_string(),
        },
        SummaryRow {
            field: "Test rows",
            value: report.test_rows.to_string(),
        },
        SummaryRow {
            field: "Features",
            value: report.model.n_features().to_string(),
        },
    ];

    if let Some(receipt) = receipt {
        rows.push(SummaryRow {
            field: "Local file",
            value: receipt.local_path.display().to_string(),
        });
        rows.push(SummaryRow {
            field: "Size",
            value: format_bytes(receipt.size_bytes as u64),
        });
        rows.push(SummaryRow {
            field: "SHA-256",
            value: receipt.checksum.clone(),
        });
    }

    Table::new(rows).with(Style::rounded()).to_string()
}
