//! `cache-key` command: print the `resource_id` a search is cached under.

use anyhow::Result;
use serde_json::json;
use stargazer_lib::{ResourceId, SearchRequest};

use crate::output::write_json;
use crate::{FilterArgs, OutputFormat};

/// Normalize the filters and derive their key. No dataset is needed.
pub fn cache_key(filters: &FilterArgs) -> Result<ResourceId> {
    let request = SearchRequest::normalize(&filters.params())?;
    Ok(ResourceId::for_request(&request))
}

pub fn run_cache_key(filters: &FilterArgs, format: OutputFormat) -> Result<()> {
    let id = cache_key(filters)?;
    match format {
        OutputFormat::Text => println!("{}", id),
        OutputFormat::Json => {
            write_json(&mut std::io::stdout().lock(), &json!({ "resource_id": id }))?
        }
    }
    Ok(())
}
