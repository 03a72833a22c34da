use thiserror::Error;

#[derive(Debug, Error)]
pub enum StockError {
    #[error("malformed inventory at row {row}: {reason}")]
    MalformedInventory { row: usize, reason: String },

    #[error("title {title:?} appears more than once in the {inventory} inventory")]
    AmbiguousTitle {
        title: String,
        inventory: &'static str,
    },

    #[error("failed to fetch stock for store {store_id}")]
    Fetcher {
        store_id: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),

    #[error("pagination failed for store {store_id}: {reason}")]
    Pagination { store_id: u32, reason: String },

    #[error("upload request failed")]
    Upload(#[source] reqwest::Error),

    #[error("upload rejected: {0}")]
    UploadRejected(String),

    #[error("credentials error: {0}")]
    Credentials(String),

    #[error("failed to read previous snapshot")]
    SnapshotRead(#[from] calamine::Error),

    #[error("failed to write snapshot")]
    SnapshotWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StockError {
    pub(crate) fn malformed(row: usize, reason: impl Into<String>) -> Self {
        Self::MalformedInventory {
            row,
            reason: reason.into(),
        }
    }
}
