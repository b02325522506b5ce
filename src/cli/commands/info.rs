//! Info command implementation.

use super::load_retriever;
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the info command.
pub async fn run_info(settings: Settings) -> Result<()> {
    let retriever = load_retriever(&settings).await?;
    let summary = retriever.describe().await?;

    Output::header("Hark Index");
    println!();
    Output::kv("Backend", &settings.index.provider.to_string());
    Output::kv("Location", &settings.index_path().display().to_string());
    Output::kv("Table", &summary.table);
    Output::kv("Segments", &summary.records.to_string());
    Output::kv(
        "Vector dimension",
        &summary
            .dimension
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string()),
    );
    Output::kv("Metric", &summary.metric);
    Output::kv("Model", &format!("{} ({} dims)", summary.model, summary.model_dimensions));
    Output::kv("Audio directory", &retriever.audio_dir().display().to_string());

    if !retriever.audio_dir().is_dir() {
        Output::warning("Audio directory does not exist; results will have no playable audio.");
    }

    Ok(())
}
