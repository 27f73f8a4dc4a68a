//! `search` command: run one page of a site search locally.

use std::io::Write;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use stargazer_lib::{load_dataset, SearchConfig, SearchEngine, DEFAULT_PAGE_SIZE};

use super::cache_key::cache_key;
use crate::output::write_page;
use crate::terminal::ColorPalette;
use crate::{FilterArgs, GlobalOptions};

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub filters: FilterArgs,

    /// 1-based page number.
    #[arg(long, default_value_t = 1, allow_hyphen_values = true)]
    pub page: i64,

    /// Items per page.
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, allow_hyphen_values = true)]
    pub page_size: i64,
}

pub async fn run_search(global: &GlobalOptions, args: &SearchArgs) -> Result<()> {
    let params = args.filters.params();
    let config = SearchConfig::from_env();

    // Reject bad input before touching the dataset.
    let resource_id = cache_key(&args.filters)?;
    tracing::debug!(%resource_id, "filters accepted");

    let paths = global.dataset_paths();
    let dataset = load_dataset(&paths, &config).context("failed to load the dataset")?;
    let engine = SearchEngine::new(dataset.sources, config);

    let start = Instant::now();
    let page = engine.search(&params, args.page, args.page_size).await?;
    tracing::info!(
        resource_id = %page.resource_id,
        total = page.total,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "search finished"
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_page(&mut out, &page, global.format, &ColorPalette::detect())?;
    out.flush()?;

    engine.shutdown();
    Ok(())
}
