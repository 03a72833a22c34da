use chrono::NaiveDate;
use strum_macros::{Display, EnumString};

pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Items on sale at one store, in no particular order.
pub type Inventory<T> = Vec<T>;

#[derive(Debug, Clone, PartialEq)]
pub struct StockItem {
    pub category: String,
    pub title: String,
    pub price: f64,
    pub for_sale: bool,
}

#[derive(Display, EnumString, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(ascii_case_insensitive)]
pub enum Status {
    #[strum(to_string = "New")]
    New,
    #[strum(to_string = "In Stock", serialize = "IN_STOCK", serialize = "InStock")]
    InStock,
    #[strum(to_string = "Sold")]
    Sold,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledItem {
    pub item: StockItem,
    pub status: Status,
    /// Date the status last changed.
    pub status_date: NaiveDate,
}

impl ReconciledItem {
    pub fn new(item: StockItem, status: Status, status_date: NaiveDate) -> Self {
        Self {
            item,
            status,
            status_date,
        }
    }

    pub fn title(&self) -> &str {
        &self.item.title
    }
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Presentation order: (category, title) ascending, compared byte-wise.
pub fn sort_for_display(items: &mut [ReconciledItem]) {
    items.sort_by(|a, b| {
        (a.item.category.as_str(), a.item.title.as_str())
            .cmp(&(b.item.category.as_str(), b.item.title.as_str()))
    });
}

/// The part of a reconciled inventory that is still on the shelves.
#[cfg(test)]
pub(crate) fn in_stock(items: &[ReconciledItem]) -> Inventory<StockItem> {
    items
        .iter()
        .filter(|i| i.status != Status::Sold)
        .map(|i| i.item.clone())
        .collect()
}

#[cfg(test)]
pub(crate) fn game(category: &str, title: &str, price: f64) -> StockItem {
    StockItem {
        category: category.into(),
        title: title.into(),
        price,
        for_sale: true,
    }
}

#[cfg(test)]
pub(crate) fn date(value: &str) -> NaiveDate {
    parse_date(value).unwrap()
}
