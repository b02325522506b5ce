//! CLI command implementations.

mod config;
mod info;
mod search;
mod serve;

pub use config::run_config;
pub use info::run_info;
pub use search::run_search;
pub use serve::{router, run_serve, AppState};

use crate::config::Settings;
use crate::error::{HarkError, Result};
use crate::retriever::Retriever;

/// Pick the result count for a front-end request.
///
/// Falls back to `search.default_limit` and rejects counts above
/// `search.max_limit`. Zero is passed through so the retriever rejects it.
pub fn resolve_limit(requested: Option<usize>, settings: &Settings) -> Result<usize> {
    let limit = requested.unwrap_or(settings.search.default_limit);
    if limit > settings.search.max_limit {
        return Err(HarkError::InvalidArgument(format!(
            "limit {} exceeds the maximum of {}",
            limit, settings.search.max_limit
        )));
    }
    Ok(limit)
}

/// Load the model and open the index, with a spinner while weights load.
async fn load_retriever(settings: &Settings) -> Result<Retriever> {
    let spinner = crate::cli::Output::spinner("Loading embedding model and index...");
    let retriever = Retriever::from_settings(settings).await;
    spinner.finish_and_clear();
    retriever
}
