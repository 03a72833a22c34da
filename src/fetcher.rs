use std::collections::HashSet;
use std::time::Duration;

use log::debug;
use once_cell::sync::Lazy;
use reqwest::blocking::Client;
use reqwest::Url;
use serde::Deserialize;

use crate::error::StockError;
use crate::inventory::{Inventory, StockItem};

pub fn build_client(user_agent: &str) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .build()
}

pub static CLIENT: Lazy<Client> = Lazy::new(|| {
    build_client(concat!("cex-stock-tracker/", env!("CARGO_PKG_VERSION")))
        .expect("Failed to build HTTP client")
});

pub trait InventorySource {
    /// Complete, deduplicated listing for one store.
    fn fetch_current(&self, store_id: u32) -> Result<Inventory<StockItem>, StockError>;
}

#[derive(Deserialize)]
struct BoxesEnvelope {
    response: BoxesResponse,
}

#[derive(Deserialize)]
struct BoxesResponse {
    #[serde(default)]
    ack: String,
    #[serde(default)]
    data: Option<BoxesPage>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct BoxesPage {
    #[serde(default)]
    boxes: Vec<StockBox>,
    #[serde(default)]
    total_records: usize,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    code: serde_json::Value,
    #[serde(default)]
    internal_message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StockBox {
    category_name: String,
    box_name: String,
    sell_price: f64,
    box_sale_allowed: i64,
}

impl From<StockBox> for StockItem {
    fn from(b: StockBox) -> Self {
        Self {
            category: b.category_name,
            title: b.box_name,
            price: b.sell_price,
            for_sale: b.box_sale_allowed == 1,
        }
    }
}

pub struct CexClient {
    client: Client,
    base_url: Url,
    categories: Vec<u32>,
}

fn id_list(ids: &[u32]) -> String {
    let joined = ids.iter().map(u32::to_string).collect::<Vec<_>>().join(",");
    format!("[{joined}]")
}

impl CexClient {
    pub fn new(base_url: Url, categories: Vec<u32>, user_agent: &str) -> Result<Self, StockError> {
        Ok(Self {
            client: build_client(user_agent).map_err(StockError::HttpClient)?,
            base_url,
            categories,
        })
    }

    fn fetch_page(&self, store_id: u32, first_record: usize) -> Result<BoxesPage, StockError> {
        let pagination = |reason: String| StockError::Pagination { store_id, reason };

        let mut url = self
            .base_url
            .join("boxes")
            .map_err(|e| pagination(format!("bad base url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("storeIds", &id_list(&[store_id]))
            .append_pair("categoryIds", &id_list(&self.categories))
            .append_pair("firstRecord", &first_record.to_string());

        let fetch_err = |source| StockError::Fetcher { store_id, source };
        let envelope: BoxesEnvelope = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(fetch_err)?;
        let response = envelope.response;

        if !response.ack.is_empty() && !response.ack.eq_ignore_ascii_case("success") {
            let detail = response
                .error
                .map(|e| format!("{} ({})", e.internal_message, e.code))
                .unwrap_or_default();
            return Err(pagination(format!("api replied {}: {detail}", response.ack)));
        }

        Ok(response.data.unwrap_or_default())
    }
}

impl InventorySource for CexClient {
    fn fetch_current(&self, store_id: u32) -> Result<Inventory<StockItem>, StockError> {
        let first = self.fetch_page(store_id, 0)?;
        let total = first.total_records;
        let mut boxes = first.boxes;

        while boxes.len() < total {
            let page = self.fetch_page(store_id, boxes.len() + 1)?;
            if page.boxes.is_empty() {
                return Err(StockError::Pagination {
                    store_id,
                    reason: format!("empty page after {} of {total} records", boxes.len()),
                });
            }
            boxes.extend(page.boxes);
        }

        let mut seen = HashSet::new();
        Ok(boxes
            .into_iter()
            .filter(|b| {
                let fresh = seen.insert(b.box_name.clone());
                if !fresh {
                    debug!("Store {store_id}: skipping duplicate listing {:?}", b.box_name);
                }
                fresh
            })
            .map(StockItem::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn stock_box(title: &str) -> serde_json::Value {
        json!({
            "categoryName": "N64 Software",
            "boxName": title,
            "sellPrice": 20,
            "boxSaleAllowed": 1,
            "boxId": "045496870034"
        })
    }

    fn page(titles: &[&str], total: usize) -> serde_json::Value {
        json!({
            "response": {
                "ack": "Success",
                "data": {
                    "boxes": titles.iter().map(|t| stock_box(t)).collect::<Vec<_>>(),
                    "totalRecords": total
                },
                "error": { "code": "", "internal_message": "", "moreInfo": [] }
            }
        })
    }

    fn client_for(server: &MockServer) -> CexClient {
        let base = Url::parse(&server.url("/v3/")).unwrap();
        CexClient::new(base, vec![1030, 667], "Mozilla/5.0 (test)").unwrap()
    }

    #[test]
    fn sends_configured_user_agent() {
        let server = MockServer::start();
        let listing = server.mock(|when, then| {
            when.method(GET)
                .path("/v3/boxes")
                .header("user-agent", "Mozilla/5.0 (test)");
            then.status(200).json_body(page(&["A"], 1));
        });

        client_for(&server).fetch_current(54).unwrap();
        listing.assert();
    }

    #[test]
    fn follows_pagination_until_total() {
        let server = MockServer::start();
        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/v3/boxes")
                .query_param("storeIds", "[54]")
                .query_param("categoryIds", "[1030,667]")
                .query_param("firstRecord", "0");
            then.status(200).json_body(page(&["A", "B"], 3));
        });
        let second = server.mock(|when, then| {
            when.method(GET).path("/v3/boxes").query_param("firstRecord", "3");
            then.status(200).json_body(page(&["C"], 3));
        });

        let items = client_for(&server).fetch_current(54).unwrap();
        first.assert();
        second.assert();

        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["A", "B", "C"]);
        assert_eq!(items[0].category, "N64 Software");
        assert_eq!(items[0].price, 20.0);
        assert!(items[0].for_sale);
    }

    #[test]
    fn drops_duplicate_titles() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v3/boxes");
            then.status(200).json_body(page(&["A", "B", "A"], 3));
        });

        let items = client_for(&server).fetch_current(54).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn null_data_is_an_empty_listing() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v3/boxes");
            then.status(200)
                .json_body(json!({ "response": { "ack": "Success", "data": null } }));
        });

        assert!(client_for(&server).fetch_current(54).unwrap().is_empty());
    }

    #[test]
    fn short_page_is_a_pagination_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v3/boxes").query_param("firstRecord", "0");
            then.status(200).json_body(page(&["A"], 5));
        });
        server.mock(|when, then| {
            when.method(GET).path("/v3/boxes").query_param("firstRecord", "2");
            then.status(200).json_body(page(&[], 5));
        });

        let err = client_for(&server).fetch_current(54).unwrap_err();
        assert!(matches!(err, StockError::Pagination { store_id: 54, .. }));
    }

    #[test]
    fn failed_ack_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v3/boxes");
            then.status(200).json_body(json!({
                "response": {
                    "ack": "Failure",
                    "data": null,
                    "error": { "code": 11, "internal_message": "Invalid store", "moreInfo": [] }
                }
            }));
        });

        let err = client_for(&server).fetch_current(1).unwrap_err();
        assert!(err.to_string().contains("Invalid store"));
    }

    #[test]
    fn http_failure_is_a_fetcher_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v3/boxes");
            then.status(503);
        });

        let err = client_for(&server).fetch_current(3115).unwrap_err();
        assert!(matches!(err, StockError::Fetcher { store_id: 3115, .. }));
    }
}
