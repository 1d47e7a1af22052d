pub mod browser;

use crate::error::{Result, ScraperError};
use crate::scraper::{Scraper, VehicleRecord};
use crate::sink::{self, Row};
pub use crate::{log_error, log_info, log_warn};
use async_trait::async_trait;
use std::path::Path;

pub use browser::BrowserSession;

/// Something that can render a detail page and hand back its HTML.
///
/// Implementations are stateful (one browser tab), hence `&mut self`: a
/// fetcher serves one record at a time.
#[async_trait]
pub trait DetailFetcher: Send {
    async fn page_source(&mut self, url: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct EnrichOptions {
    /// Index of the first input record to visit; earlier ones are taken
    /// from the existing output file.
    pub start_index: usize,
    pub checkpoint_every: usize,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            start_index: 0,
            checkpoint_every: 100,
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct EnrichReport {
    pub processed: usize,
    pub enriched: usize,
    pub failed: usize,
    /// Rows in the output file, prior runs included.
    pub written: usize,
}

/// Visits the detail page of every vehicle in `vehicles` (from
/// `options.start_index` on) and writes the merged rows to `output`.
///
/// Records whose page cannot be loaded or parsed are logged and left out of
/// the output. The rows collected so far, `prior` first, are flushed every
/// `options.checkpoint_every` records and once at the end.
pub async fn enrich_vehicles<F>(
    fetcher: &mut F,
    vehicles: &[VehicleRecord],
    prior: Vec<Row>,
    options: &EnrichOptions,
    output: &Path,
) -> Result<EnrichReport>
where
    F: DetailFetcher + ?Sized,
{
    let total = vehicles.len();
    let checkpoint_every = options.checkpoint_every.max(1);
    let mut rows = prior;
    let mut report = EnrichReport::default();

    log_info!(
        "[enrich] Processing {} vehicles from index {} ({} rows carried over)",
        total.saturating_sub(options.start_index),
        options.start_index,
        rows.len()
    );

    for (index, vehicle) in vehicles.iter().enumerate().skip(options.start_index) {
        report.processed += 1;

        match enrich_vehicle(fetcher, vehicle).await {
            Ok(row) => {
                report.enriched += 1;
                rows.push(row);
                log_info!(
                    "[enrich] [{}/{}] Done -> Vehicle {}: {}",
                    index + 1,
                    total,
                    index + 1,
                    vehicle.model
                );
            }
            Err(e) => {
                report.failed += 1;
                log_error!(e => "[enrich] [{}/{}] Dropping vehicle {}", index + 1, total, vehicle.url);
            }
        }

        if report.processed % checkpoint_every == 0 {
            sink::write_rows(output, &rows)?;
        }
    }

    sink::write_rows(output, &rows)?;
    report.written = rows.len();

    log_info!(
        "[enrich] Total detailed vehicles processed: {} ({} enriched, {} dropped)",
        report.processed,
        report.enriched,
        report.failed
    );
    Ok(report)
}

async fn enrich_vehicle<F>(fetcher: &mut F, vehicle: &VehicleRecord) -> Result<Row>
where
    F: DetailFetcher + ?Sized,
{
    if vehicle.url.is_empty() {
        return Err(ScraperError::ParseError("vehicle has no detail URL".to_string()).into());
    }

    let html = fetcher.page_source(&vehicle.url).await?;
    let details = Scraper::new(&html).details().extract_details()?;

    let mut row = vehicle.to_row();
    for (label, value) in details {
        if row.contains_key(&label) {
            log_warn!(
                "[enrich] Ignoring detail '{}' of {}: catalog column already set",
                label,
                vehicle.url
            );
            continue;
        }
        row.insert(label, value);
    }
    Ok(row)
}

/// Runs the detail phase from the catalog file at `input` into `output`.
///
/// When resuming (`start_index > 0`) the rows already in `output` are kept
/// ahead of the new ones.
pub async fn enrich_file<F>(
    fetcher: &mut F,
    input: &Path,
    output: &Path,
    options: &EnrichOptions,
) -> Result<EnrichReport>
where
    F: DetailFetcher + ?Sized,
{
    let vehicles: Vec<VehicleRecord> = sink::read_records(input)?;

    let prior = if options.start_index > 0 && output.exists() {
        let rows = sink::read_rows(output)?;
        log_info!(
            "[enrich] Resuming at index {} with {} rows from {}",
            options.start_index,
            rows.len(),
            output.display()
        );
        rows
    } else {
        Vec::new()
    };

    if options.start_index >= vehicles.len() {
        log_warn!(
            "[enrich] Start index {} is past the {} vehicles in {}",
            options.start_index,
            vehicles.len(),
            input.display()
        );
    }

    enrich_vehicles(fetcher, &vehicles, prior, options, output).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BrowserError;
    use std::collections::HashMap;
    use std::path::PathBuf;

    /// Serves canned pages and notes how many rows the output file held at
    /// every visit, which shows when checkpoints happened.
    struct FakeFetcher {
        pages: HashMap<String, String>,
        output: PathBuf,
        visited: Vec<String>,
        rows_on_disk: Vec<usize>,
    }

    impl FakeFetcher {
        fn new(output: PathBuf, pages: Vec<(&str, String)>) -> Self {
            Self {
                pages: pages
                    .into_iter()
                    .map(|(url, html)| (url.to_string(), html))
                    .collect(),
                output,
                visited: Vec::new(),
                rows_on_disk: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl DetailFetcher for FakeFetcher {
        async fn page_source(&mut self, url: &str) -> Result<String> {
            self.visited.push(url.to_string());
            let on_disk = if self.output.exists() {
                sink::read_rows(&self.output).map(|rows| rows.len()).unwrap_or(0)
            } else {
                0
            };
            self.rows_on_disk.push(on_disk);

            self.pages.get(url).cloned().ok_or_else(|| {
                BrowserError::Timeout {
                    url: url.to_string(),
                    seconds: 60,
                }
                .into()
            })
        }
    }

    fn vehicle(url: &str, model: &str) -> VehicleRecord {
        VehicleRecord {
            url: url.to_string(),
            brand: "Audi".to_string(),
            model: model.to_string(),
            ..VehicleRecord::default()
        }
    }

    fn detail_page(engine: &str) -> String {
        format!(
            r#"<h2 class="vehicle-card-title">Vehicle</h2>
            <dl class="vehicle-card-dl"><dt>Engine</dt><dd>{engine}</dd><dt>Model</dt><dd>from page</dd></dl>"#
        )
    }

    #[tokio::test]
    async fn merges_details_and_drops_failures() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("details.csv");
        let mut fetcher = FakeFetcher::new(
            output.clone(),
            vec![("https://a/1", detail_page("2.0 TDI")), ("https://a/3", detail_page("3.0 V6"))],
        );
        let vehicles = vec![
            vehicle("https://a/1", "A4"),
            vehicle("https://a/2", "A5"),
            vehicle("https://a/3", "A6"),
        ];

        let report = enrich_vehicles(
            &mut fetcher,
            &vehicles,
            Vec::new(),
            &EnrichOptions::default(),
            &output,
        )
        .await
        .unwrap();

        assert_eq!(
            report,
            EnrichReport {
                processed: 3,
                enriched: 2,
                failed: 1,
                written: 2,
            }
        );

        let rows = sink::read_rows(&output).unwrap();
        let urls: Vec<&str> = rows.iter().map(|r| r["URL"].as_str().unwrap()).collect();
        assert_eq!(urls, vec!["https://a/1", "https://a/3"]);
        assert_eq!(rows[1]["Engine"], "3.0 V6");
        assert_eq!(rows[0]["Brand"], "Audi");
        // Catalog columns keep their fetched values.
        assert_eq!(rows[0]["Model"], "A4");
        assert_eq!(rows[1]["Model"], "A6");
    }

    #[tokio::test]
    async fn detail_labels_never_replace_catalog_columns() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("details.csv");
        let page = r#"<h2 class="vehicle-card-title">Vehicle</h2>
            <dl class="vehicle-card-dl"><dt>Brand</dt><dd>Volkswagen Group</dd><dt>ECU</dt><dd>EDC17</dd></dl>"#;
        let mut fetcher = FakeFetcher::new(output.clone(), vec![("https://a/1", page.to_string())]);

        enrich_vehicles(
            &mut fetcher,
            &[vehicle("https://a/1", "A4")],
            Vec::new(),
            &EnrichOptions::default(),
            &output,
        )
        .await
        .unwrap();

        let rows = sink::read_rows(&output).unwrap();
        assert_eq!(rows[0]["Brand"], "Audi");
        assert_eq!(rows[0]["ECU"], "EDC17");
    }

    #[tokio::test]
    async fn flushes_at_every_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("details.csv");
        let urls: Vec<String> = (0..5).map(|i| format!("https://a/{i}")).collect();
        let mut fetcher = FakeFetcher::new(
            output.clone(),
            urls.iter().map(|u| (u.as_str(), detail_page("x"))).collect(),
        );
        let vehicles: Vec<VehicleRecord> = urls.iter().map(|u| vehicle(u, "A4")).collect();

        let options = EnrichOptions {
            start_index: 0,
            checkpoint_every: 2,
        };
        enrich_vehicles(&mut fetcher, &vehicles, Vec::new(), &options, &output)
            .await
            .unwrap();

        assert_eq!(fetcher.rows_on_disk, vec![0, 0, 2, 2, 4]);
        assert_eq!(sink::read_rows(&output).unwrap().len(), 5);
    }

    #[tokio::test]
    async fn resumes_from_index_keeping_prior_rows() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("vehicles.csv");
        let output = dir.path().join("details.csv");

        let vehicles: Vec<VehicleRecord> = (0..4)
            .map(|i| vehicle(&format!("https://a/{i}"), &format!("M{i}")))
            .collect();
        sink::write_records(&input, &vehicles).unwrap();

        let mut first = vehicles[0].to_row();
        first.insert("Engine".into(), "earlier run".into());
        let mut second = vehicles[1].to_row();
        second.insert("Engine".into(), "earlier run".into());
        sink::write_rows(&output, &[first, second]).unwrap();

        let mut fetcher = FakeFetcher::new(
            output.clone(),
            vec![("https://a/2", detail_page("new")), ("https://a/3", detail_page("new"))],
        );
        let options = EnrichOptions {
            start_index: 2,
            checkpoint_every: 100,
        };

        let report = enrich_file(&mut fetcher, &input, &output, &options)
            .await
            .unwrap();

        assert_eq!(fetcher.visited, vec!["https://a/2", "https://a/3"]);
        assert_eq!(report.processed, 2);
        assert_eq!(report.written, 4);

        let rows = sink::read_rows(&output).unwrap();
        let engines: Vec<&str> = rows.iter().map(|r| r["Engine"].as_str().unwrap()).collect();
        assert_eq!(engines, vec!["earlier run", "earlier run", "new", "new"]);
    }

    #[tokio::test]
    async fn vehicle_without_url_is_dropped_without_visiting() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("details.csv");
        let mut fetcher = FakeFetcher::new(output.clone(), Vec::new());

        let report = enrich_vehicles(
            &mut fetcher,
            &[vehicle("", "A4")],
            Vec::new(),
            &EnrichOptions::default(),
            &output,
        )
        .await
        .unwrap();

        assert!(fetcher.visited.is_empty());
        assert_eq!(report.failed, 1);
        assert_eq!(report.written, 0);
    }
}
