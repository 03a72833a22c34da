use color_eyre::eyre::Context;
use color_eyre::Result;
use log::{error, info};

mod auth;
mod config;
mod error;
mod fetcher;
mod inventory;
mod logging;
mod reconcile;
mod run;
mod spreadsheet;
mod upload;

use crate::auth::FileTokenStore;
use crate::config::Config;
use crate::fetcher::CexClient;
use crate::inventory::format_date;
use crate::upload::DriveUploader;

fn main() -> Result<()> {
    color_eyre::install()?;
    let config = Config::from_env()?;
    let _logger = logging::init(config.log_dir.as_deref())?;

    let today = config
        .today
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    info!("Reconciling stock for {}", format_date(today));

    let source = CexClient::new(
        config.cex_base_url.clone(),
        config.categories.clone(),
        &config.user_agent,
    )?;
    let sheets = run::run_stores(&config, &source, today)
        .wrap_err("refusing to overwrite the previous snapshot")?;

    spreadsheet::write_snapshot(&config.file_name, &sheets, config.highlight_rows)
        .wrap_err_with(|| format!("failed to write {}", config.file_name.display()))?;
    info!("New spreadsheet generated");

    if config.skip_upload {
        info!("Upload skipped");
        return Ok(());
    }

    let tokens = FileTokenStore::new(
        config.client_secrets_path.clone(),
        config.token_path.clone(),
    );
    let mut uploader = DriveUploader::new(
        config.drive_api_base.clone(),
        config.drive_folder.clone(),
        tokens,
    );
    if let Err(e) = uploader.upload(&config.file_name) {
        error!("Upload failed: {e}");
        return Err(e).wrap_err("failed to upload spreadsheet");
    }

    Ok(())
}
