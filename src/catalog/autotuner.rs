use super::{fetch_catalog, page_count, CatalogPage, CatalogRun, CatalogSource};
use crate::client::{Client, RetryPolicy};
use crate::config::Config;
use crate::error::{Result, ScraperError};
use crate::sink::{self, Row};
pub use crate::{log_info, log_warn};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

pub const BASE_URL: &str = "https://www.autotuner.com";
pub const SEARCH_PATH: &str = "/a/app/compatibility/search/page/";

pub const VEHICLES_FILE: &str = "autotuner_vehicles.csv";
pub const LOG_FILE: &str = "autotuner_scraper.log";

const BRAND_LOGO_URL: &str = "https://assets.autotuner.com/brand/logo/";
const METHOD_LOGO_URL: &str = "https://www.autotuner.com/cdn/shop/t/24/assets/";

pub const MANUFACTURER_FIELD: &str = "manufacturerId";
pub const METHODS_FIELD: &str = "methods";
pub const LOGO_COLUMN: &str = "Logo";
pub const METHOD_LOGOS_COLUMN: &str = "Method Logos";

const HEADERS: [(&str, &str); 13] = [
    ("accept", "*/*"),
    ("accept-language", "en-US,en;q=0.9"),
    ("content-type", "application/json"),
    ("dnt", "1"),
    ("priority", "u=1, i"),
    ("referer", "https://www.autotuner.com/nl/pages/compatibiliteit"),
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

/// Query filters of the compatibility search. All empty lists everything.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub search: String,
    pub vehicle_type: String,
    pub ecu_type: String,
}

impl SearchFilters {
    fn query(&self) -> [(&'static str, String); 3] {
        [
            ("search", self.search.clone()),
            ("type", self.vehicle_type.clone()),
            ("ecuType", self.ecu_type.clone()),
        ]
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    // Both a missing and a `null` list mean no results.
    #[serde(default)]
    data: Option<Vec<Row>>,
    #[serde(rename = "nbPage", default)]
    nb_page: Value,
}

/// The JSON compatibility search. Records are kept exactly as the API
/// returns them.
pub struct AutotunerCatalog {
    client: Arc<Client>,
    filters: SearchFilters,
}

impl AutotunerCatalog {
    pub fn new(client: Arc<Client>, filters: SearchFilters) -> Self {
        Self { client, filters }
    }
}

#[async_trait]
impl CatalogSource for AutotunerCatalog {
    type Record = Row;

    fn name(&self) -> &'static str {
        "AutoTuner"
    }

    async fn fetch_page(&self, page: u32) -> Result<CatalogPage<Row>> {
        let path = format!("{}{}", SEARCH_PATH, page);
        let response = self.client.get(&path, &self.filters.query()).await?;

        // The API answers `null` instead of an empty envelope past the end.
        let body: Option<SearchResponse> = response.json()?;
        let body = body.unwrap_or_default();

        Ok(CatalogPage {
            total_pages: page_count(&body.nb_page),
            records: body.data.unwrap_or_default(),
        })
    }
}

/// The `methods` list of a vehicle: the ways a tool can connect to its ECU.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodList(pub Vec<String>);

impl MethodList {
    /// Reads the list from a record, either as the API's array or as the
    /// text a CSV cell holds.
    pub fn from_value(value: Option<&Value>) -> Result<Self> {
        match value {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(Value::Array(items)) => Ok(Self(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(method) => method.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            )),
            Some(Value::String(text)) => Self::parse_field(text),
            Some(other) => Err(ScraperError::ParseError(format!(
                "methods is neither a list nor text: {}",
                other
            ))
            .into()),
        }
    }

    /// Text form stored in the CSV cell: a JSON array.
    pub fn to_field(&self) -> String {
        Value::from(self.0.clone()).to_string()
    }

    /// Parses a CSV cell back into the list. Accepts the JSON array written
    /// by `to_field` and the `['a', 'b']` form of older exports.
    pub fn parse_field(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Self::default());
        }

        if let Ok(methods) = serde_json::from_str::<Vec<String>>(text) {
            return Ok(Self(methods));
        }

        let inner = text
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| ScraperError::ParseError(format!("not a method list: {}", text)))?;

        Ok(Self(
            inner
                .split(',')
                .map(|item| item.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
                .filter(|item| !item.is_empty())
                .collect(),
        ))
    }

    pub fn logo_urls(&self) -> String {
        self.0
            .iter()
            .map(|method| format!("{}{}.svg", METHOD_LOGO_URL, method))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub fn brand_logo_url(manufacturer_id: Option<&Value>) -> String {
    match manufacturer_id {
        None | Some(Value::Null) => String::new(),
        Some(id) => format!("{}{}.png", BRAND_LOGO_URL, sink::cell(Some(id))),
    }
}

/// Adds the derived logo columns once all pages are in.
pub fn add_logo_columns(records: &mut [Row]) {
    for record in records.iter_mut() {
        let logo = brand_logo_url(record.get(MANUFACTURER_FIELD));
        let method_logos = match MethodList::from_value(record.get(METHODS_FIELD)) {
            Ok(methods) => methods.logo_urls(),
            Err(e) => {
                log_warn!("[autotuner] Unreadable methods, no method logos: {}", e);
                String::new()
            }
        };
        record.insert(LOGO_COLUMN.to_string(), Value::String(logo));
        record.insert(METHOD_LOGOS_COLUMN.to_string(), Value::String(method_logos));
    }
}

/// Fetches the full compatibility list, adds the logo columns and writes it
/// to `output`. Returns `None` when the first page was empty.
pub async fn scrape_catalog(
    client: Arc<Client>,
    filters: SearchFilters,
    workers: usize,
    output: &Path,
) -> Result<Option<usize>> {
    log_info!("[autotuner] Starting AutoTuner scrape...");
    let source = Arc::new(AutotunerCatalog::new(Arc::clone(&client), filters));

    let report = match fetch_catalog(source, workers).await? {
        CatalogRun::Empty => return Ok(None),
        CatalogRun::Complete(report) => report,
    };
    if !report.failed_pages.is_empty() {
        log_warn!(
            "[autotuner] {} of {} pages missing from the output",
            report.failed_pages.len(),
            report.total_pages
        );
    }

    let mut records = report.records;

    add_logo_columns(&mut records);
    sink::write_rows(output, &records)?;
    client.print_report().await;
    Ok(Some(records.len()))
}
