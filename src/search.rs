use crate::config::AppConfig;
use crate::lookup::SymbolDirectory;
use crate::providers::directory::HttpDirectoryProvider;
use crate::ui;
use anyhow::{Result, bail};
use comfy_table::Cell;
use tracing::info;

pub async fn run(query: &str, config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };

    let Some(directory_config) = &config.providers.directory else {
        bail!("Symbol directory is not configured; add providers.directory to the config");
    };

    let provider = HttpDirectoryProvider::new(&directory_config.base_url);
    let directory = SymbolDirectory::new();
    let matches = directory.search(&provider, query.trim()).await?;

    if matches.is_empty() {
        println!("No symbols matched '{query}'.");
        return Ok(());
    }
    info!("Found {} matches for '{}'", matches.len(), query);

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Code"), ui::header_cell("Name")]);
    for entry in &matches {
        table.add_row(vec![Cell::new(&entry.code), Cell::new(&entry.name)]);
    }
    println!("{table}");

    Ok(())
}
