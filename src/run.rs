use std::path::Path;

use chrono::NaiveDate;
use log::{debug, error, info, warn};

use crate::config::{Config, Store};
use crate::error::StockError;
use crate::fetcher::InventorySource;
use crate::inventory::format_date;
use crate::reconcile::{reconcile, StatusCounts};
use crate::spreadsheet::{read_previous_snapshot, StoreSheet};

fn reconcile_store(
    source: &dyn InventorySource,
    snapshot: &Path,
    store: &Store,
    today: NaiveDate,
    grace_period_days: i64,
) -> Result<StoreSheet, StockError> {
    let previous = read_previous_snapshot(snapshot, &store.name)?;
    let current = source.fetch_current(store.id)?;
    info!("{}: fetched {} listings", store.name, current.len());

    let items = reconcile(&previous, &current, today, grace_period_days)?;
    for dropped in previous
        .iter()
        .filter(|old| !items.iter().any(|i| i.title() == old.title()))
    {
        debug!(
            "{}: dropping {:?}, sold on {}",
            store.name,
            dropped.title(),
            format_date(dropped.status_date)
        );
    }

    let counts = StatusCounts::tally(&items);
    info!(
        "{}: {} new, {} in stock, {} sold",
        store.name, counts.new, counts.in_stock, counts.sold
    );
    Ok(StoreSheet {
        name: store.name.clone(),
        items,
    })
}

/// Reconciles every configured store in order.
///
/// A store that fails keeps its previous sheet unchanged. If that sheet
/// cannot be read either, the whole run fails so the workbook holding it
/// is never overwritten.
pub fn run_stores(
    config: &Config,
    source: &dyn InventorySource,
    today: NaiveDate,
) -> Result<Vec<StoreSheet>, StockError> {
    info!(
        "Generating new stock data for: {}",
        config
            .stores
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    config
        .stores
        .iter()
        .map(|store| {
            match reconcile_store(source, &config.file_name, store, today, config.grace_period_days) {
                Ok(sheet) => Ok(sheet),
                Err(e) => {
                    error!("{}: {e}", store.name);
                    let items = read_previous_snapshot(&config.file_name, &store.name)?;
                    warn!("{}: keeping previous sheet ({} rows)", store.name, items.len());
                    Ok(StoreSheet {
                        name: store.name.clone(),
                        items,
                    })
                }
            }
        })
        .collect()
}
