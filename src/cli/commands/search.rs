//! Search command implementation.

use super::{load_retriever, resolve_limit};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;
use serde_json::json;

/// Run the search command.
pub async fn run_search(query: &str, limit: Option<usize>, json: bool, settings: Settings) -> Result<()> {
    let limit = resolve_limit(limit, &settings)?;
    let retriever = load_retriever(&settings).await?;

    let spinner = Output::spinner("Searching...");
    let results = retriever.search(query, limit).await;
    spinner.finish_and_clear();

    let results = match results {
        Ok(results) => results,
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    };

    if json {
        let rows: Vec<_> = results
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let audio_path = retriever.get_audio_path(&r.segment.audio_file);
                json!({
                    "rank": i + 1,
                    "id": r.segment.id,
                    "text": r.segment.text,
                    "audio_file": r.segment.audio_file,
                    "audio_path": audio_path,
                    "audio_available": audio_path.exists(),
                    "distance": r.distance,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if results.is_empty() {
        Output::warning("No results found for your query.");
        return Ok(());
    }

    Output::success(&format!("Found {} results", results.len()));
    for (i, r) in results.iter().enumerate() {
        Output::search_result(
            i + 1,
            &r.segment.id,
            r.distance,
            &r.segment.text,
            &retriever.get_audio_path(&r.segment.audio_file),
        );
    }

    Ok(())
}
