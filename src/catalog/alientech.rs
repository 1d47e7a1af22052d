use super::{fetch_catalog, page_count, CatalogPage, CatalogRun, CatalogSource};
use crate::client::{Client, RetryPolicy};
use crate::config::Config;
use crate::error::Result;
use crate::scraper::{Scraper, VehicleRecord};
use crate::sink;
pub use crate::{log_info, log_warn};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

pub const BASE_URL: &str = "https://www.alientech-tools.com";
pub const ENDPOINT: &str = "/wp-admin/admin-ajax.php";
pub const ROWS_PER_PAGE: u32 = 20;

pub const VEHICLES_FILE: &str = "alientech_vehicles.csv";
pub const DETAILS_FILE: &str = "alientech_vehicles_details.csv";
pub const LOG_FILE: &str = "alientech_scraper.log";

const HEADERS: [(&str, &str); 15] = [
    ("accept", "application/json, text/javascript, */*; q=0.01"),
    ("accept-language", "en-US,en;q=0.9"),
    (
        "content-type",
        "application/x-www-form-urlencoded; charset=UTF-8",
    ),
    ("dnt", "1"),
    ("origin", "https://www.alientech-tools.com"),
    ("priority", "u=1, i"),
    ("referer", "https://www.alientech-tools.com/vehicles/"),
    (
        "sec-ch-ua",
        "\"Not;A=Brand\";v=\"99\", \"Google Chrome\";v=\"139\", \"Chromium\";v=\"139\"",
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"Windows\""),
    ("sec-fetch-dest", "empty"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-site", "same-origin"),
    (
        "user-agent",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36",
    ),
    ("x-requested-with", "XMLHttpRequest"),
];

pub fn client(config: &Config, base_url: &str) -> Result<Client> {
    Client::builder()
        .base_url(base_url)
        .headers(&HEADERS)?
        .proxies(config.proxies.clone())
        .chrome_impersonation(true)
        .timeout(config.request_timeout())
        .retry(RetryPolicy::from(&config.retry))
        .build()
}

#[derive(Debug, Deserialize)]
struct VehicleListResponse {
    #[serde(default)]
    html: String,
    #[serde(rename = "totalPages", default)]
    total_pages: Value,
}

/// The AJAX vehicle list behind the AlienTech vehicles page. Each page is a
/// JSON envelope around an HTML fragment of table rows.
pub struct AlientechCatalog {
    client: Arc<Client>,
}

impl AlientechCatalog {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    fn form(page: u32) -> Vec<(&'static str, String)> {
        vec![
            ("action", "attvl_archive_filter_vehicle_types".to_string()),
            ("vehicleType", String::new()),
            ("brand", String::new()),
            ("fuel", String::new()),
            ("year", String::new()),
            ("pageNumber", page.to_string()),
            ("doIncrementPage", "false".to_string()),
            ("rowsPerPage", ROWS_PER_PAGE.to_string()),
            ("tool", String::new()),
            ("connectionMode", String::new()),
            ("model", String::new()),
            ("version", String::new()),
            ("engineCode", String::new()),
            ("searchQuery", String::new()),
            ("doRefreshWhenOnboarding", "true".to_string()),
            ("doReset", "false".to_string()),
            ("openEcuListOnPageLoad", "false".to_string()),
        ]
    }
}

#[async_trait]
impl CatalogSource for AlientechCatalog {
    type Record = VehicleRecord;

    fn name(&self) -> &'static str {
        "AlienTech"
    }

    /// The unfiltered list the vehicles page loads first.
    fn first_page(&self) -> u32 {
        0
    }

    async fn fetch_page(&self, page: u32) -> Result<CatalogPage<VehicleRecord>> {
        let response = self.client.post_form(ENDPOINT, &Self::form(page)).await?;
        let body: VehicleListResponse = response.json()?;

        let records = Scraper::from_rows(&body.html)
            .vehicles()
            .extract_vehicles()?;

        Ok(CatalogPage {
            records,
            total_pages: page_count(&body.total_pages),
        })
    }
}

/// Fetches the full vehicle list and writes it to `output`.
///
/// Returns the number of vehicles written, or `None` when the first page was
/// empty and nothing was written.
pub async fn scrape_catalog(client: Arc<Client>, workers: usize, output: &Path) -> Result<Option<usize>> {
    log_info!("[alientech] Scraping data from AlienTech...");
    let source = Arc::new(AlientechCatalog::new(Arc::clone(&client)));

    let report = match fetch_catalog(source, workers).await? {
        CatalogRun::Empty => return Ok(None),
        CatalogRun::Complete(report) => report,
    };
    if !report.failed_pages.is_empty() {
        log_warn!(
            "[alientech] {} of {} pages missing from the output",
            report.failed_pages.len(),
            report.total_pages
        );
    }

    sink::write_records(output, &report.records)?;
    client.print_report().await;
    Ok(Some(report.records.len()))
}
