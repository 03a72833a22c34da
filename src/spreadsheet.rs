use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use log::debug;
use rust_xlsxwriter::{Color, Format, Workbook};

use crate::error::StockError;
use crate::inventory::{
    format_date, parse_date, sort_for_display, Inventory, ReconciledItem, Status, StockItem,
};

const HEADERS: [&str; 6] = [
    "Category",
    "Title",
    "Price",
    "For Sale",
    "Status",
    "Date Added/Removed",
];
const NEW_FILL: u32 = 0xC6EFCE;
const SOLD_FILL: u32 = 0xFFC7CE;

static EMPTY: Data = Data::Empty;

/// One worksheet of the output workbook.
#[derive(Debug, Clone)]
pub struct StoreSheet {
    pub name: String,
    pub items: Inventory<ReconciledItem>,
}

struct Columns {
    category: Option<usize>,
    title: usize,
    price: Option<usize>,
    for_sale: Option<usize>,
    status: usize,
    date: usize,
}

impl Columns {
    fn locate(header: &[Data]) -> Result<Self, StockError> {
        let find = |name: &str| {
            header
                .iter()
                .position(|cell| cell_text(cell).is_some_and(|t| t.trim() == name))
        };
        let require = |name: &str| {
            find(name).ok_or_else(|| StockError::malformed(1, format!("missing {name:?} column")))
        };

        Ok(Self {
            category: find(HEADERS[0]),
            title: require(HEADERS[1])?,
            price: find(HEADERS[2]),
            for_sale: find(HEADERS[3]),
            status: require(HEADERS[4])?,
            date: require(HEADERS[5])?,
        })
    }
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) | Data::DateTimeIso(s) => Some(s.clone()),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn cell<'a>(row: &'a [Data], col: Option<usize>) -> &'a Data {
    col.and_then(|c| row.get(c)).unwrap_or(&EMPTY)
}

fn required_text(row: &[Data], col: usize, name: &str, row_no: usize) -> Result<String, StockError> {
    cell_text(cell(row, Some(col)))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| StockError::malformed(row_no, format!("missing {name}")))
}

fn parse_row(row: &[Data], cols: &Columns, row_no: usize) -> Result<ReconciledItem, StockError> {
    // Titles are the reconciliation key and are kept exactly as listed.
    let title = cell_text(cell(row, Some(cols.title)))
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| StockError::malformed(row_no, "missing title"))?;
    let status_text = required_text(row, cols.status, "status", row_no)?;
    let status: Status = status_text
        .parse()
        .map_err(|_| StockError::malformed(row_no, format!("unknown status {status_text:?}")))?;
    let date_text = required_text(row, cols.date, "status date", row_no)?;
    let status_date = parse_date(&date_text)
        .ok_or_else(|| StockError::malformed(row_no, format!("unparseable date {date_text:?}")))?;

    let price = match cell(row, cols.price) {
        Data::Float(f) => *f,
        Data::Int(i) => *i as f64,
        Data::Empty => 0.0,
        Data::String(s) => s
            .trim()
            .parse()
            .map_err(|_| StockError::malformed(row_no, format!("unparseable price {s:?}")))?,
        other => return Err(StockError::malformed(row_no, format!("unparseable price {other:?}"))),
    };
    let for_sale = match cell(row, cols.for_sale) {
        Data::Bool(b) => *b,
        Data::Int(i) => *i == 1,
        Data::Float(f) => *f == 1.0,
        Data::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1"),
        _ => false,
    };

    Ok(ReconciledItem::new(
        StockItem {
            category: cell_text(cell(row, cols.category)).unwrap_or_default(),
            title,
            price,
            for_sale,
        },
        status,
        status_date,
    ))
}

/// Reads one store's sheet from the last written workbook.
///
/// A missing workbook or sheet yields an empty inventory.
pub fn read_previous_snapshot(
    path: &Path,
    store_name: &str,
) -> Result<Inventory<ReconciledItem>, StockError> {
    if !path.exists() {
        debug!("No previous snapshot at {}", path.display());
        return Ok(Vec::new());
    }

    let mut workbook = open_workbook_auto(path)?;
    if !workbook.sheet_names().iter().any(|s| s == store_name) {
        debug!("Previous snapshot has no sheet for {store_name}");
        return Ok(Vec::new());
    }
    let range = workbook.worksheet_range(store_name)?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };
    let cols = Columns::locate(header)?;

    rows.enumerate()
        .filter(|(_, row)| row.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|(idx, row)| parse_row(row, &cols, idx + 2))
        .collect()
}

fn render(item: &ReconciledItem) -> [String; 6] {
    [
        item.item.category.clone(),
        item.item.title.clone(),
        item.item.price.to_string(),
        if item.item.for_sale { "TRUE" } else { "FALSE" }.to_string(),
        item.status.to_string(),
        format_date(item.status_date),
    ]
}

fn column_widths(items: &[ReconciledItem]) -> [usize; 6] {
    let mut widths = HEADERS.map(|h| h.chars().count());
    for item in items {
        for (width, value) in widths.iter_mut().zip(render(item)) {
            *width = (*width).max(value.chars().count());
        }
    }
    widths.map(|w| w + 1)
}

/// Writes every store to its own sheet, replacing the file at `path`.
pub fn write_snapshot(path: &Path, sheets: &[StoreSheet], highlight: bool) -> Result<(), StockError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let plain = Format::new();
    let new_format = Format::new().set_background_color(Color::RGB(NEW_FILL));
    let sold_format = Format::new().set_background_color(Color::RGB(SOLD_FILL));

    for sheet in sheets {
        let mut items = sheet.items.clone();
        sort_for_display(&mut items);

        let worksheet = workbook.add_worksheet().set_name(&sheet.name)?;
        for (col, header) in HEADERS.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
        }

        for (idx, item) in items.iter().enumerate() {
            let row = idx as u32 + 1;
            let format = match item.status {
                Status::New if highlight => &new_format,
                Status::Sold if highlight => &sold_format,
                _ => &plain,
            };
            worksheet.write_string_with_format(row, 0, &item.item.category, format)?;
            worksheet.write_string_with_format(row, 1, &item.item.title, format)?;
            worksheet.write_number_with_format(row, 2, item.item.price, format)?;
            worksheet.write_boolean_with_format(row, 3, item.item.for_sale, format)?;
            worksheet.write_string_with_format(row, 4, item.status.to_string(), format)?;
            worksheet.write_string_with_format(row, 5, format_date(item.status_date), format)?;
        }

        for (col, width) in column_widths(&items).into_iter().enumerate() {
            worksheet.set_column_width(col as u16, width as f64)?;
        }
    }

    workbook.save(path)?;
    Ok(())
}
