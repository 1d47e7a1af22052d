pub mod alientech;
pub mod autotuner;

use crate::error::Result;
pub use crate::{log_error, log_info, log_warn};
use async_trait::async_trait;
use futures::{stream::FuturesUnordered, StreamExt};
use std::sync::Arc;

/// One page of a vendor catalog.
#[derive(Debug)]
pub struct CatalogPage<R> {
    pub records: Vec<R>,
    pub total_pages: u32,
}

/// A paginated vendor endpoint.
#[async_trait]
pub trait CatalogSource: Send + Sync + 'static {
    type Record: Send + 'static;

    fn name(&self) -> &'static str;

    /// Page requested first to learn the page count.
    fn first_page(&self) -> u32 {
        1
    }

    async fn fetch_page(&self, page: u32) -> Result<CatalogPage<Self::Record>>;
}

/// Reads a page count the vendors send either as a number or a numeric string.
pub(crate) fn page_count(value: &serde_json::Value) -> u32 {
    match value {
        serde_json::Value::Number(n) => n.as_u64().map_or(0, |n| n.min(u32::MAX as u64) as u32),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[derive(Debug)]
pub enum CatalogRun<R> {
    /// The first page had no records; nothing was fetched further.
    Empty,
    Complete(CatalogReport<R>),
}

#[derive(Debug)]
pub struct CatalogReport<R> {
    /// Records of every page that succeeded, in completion order.
    pub records: Vec<R>,
    pub total_pages: u32,
    pub failed_pages: Vec<u32>,
}

/// Fetches the whole catalog of `source`.
///
/// The first page is fetched on its own and its failure ends the run. Pages
/// `2..=total_pages` then run on at most `workers` concurrent tasks; a page
/// that fails contributes no records and never stops the others.
pub async fn fetch_catalog<S: CatalogSource>(
    source: Arc<S>,
    workers: usize,
) -> Result<CatalogRun<S::Record>> {
    let name = source.name();
    let first_page = source.first_page();

    log_info!("[catalog] Fetching {} page {}...", name, first_page);
    let first = source.fetch_page(first_page).await?;

    if first.records.is_empty() {
        log_info!(
            "[catalog] No vehicles found on {} page {}. Exiting.",
            name,
            first_page
        );
        return Ok(CatalogRun::Empty);
    }

    let total_pages = first.total_pages;
    log_info!(
        "[catalog] Found {} vehicles on page {}; {} pages in total",
        first.records.len(),
        first_page,
        total_pages
    );

    let mut records = first.records;
    let mut failed_pages = Vec::new();
    let workers = workers.max(1);
    let mut pending = 2..=total_pages;
    let mut tasks = FuturesUnordered::new();

    log_info!(
        "[catalog] Fetching remaining {} pages with {} workers...",
        total_pages.saturating_sub(1),
        workers
    );

    loop {
        while tasks.len() < workers {
            let Some(page) = pending.next() else {
                break;
            };
            let source = Arc::clone(&source);
            tasks.push(async move {
                let result = tokio::spawn(async move {
                    log_info!("[catalog] Scraping page {}/{}...", page, total_pages);
                    source.fetch_page(page).await
                })
                .await;
                (page, result)
            });
        }

        let Some((page, result)) = tasks.next().await else {
            break;
        };

        match result {
            Ok(Ok(fetched)) if fetched.records.is_empty() => {
                log_info!("[catalog] No vehicles found on page {}.", page);
            }
            Ok(Ok(fetched)) => {
                log_info!(
                    "[catalog] Found {} vehicles on page {}.",
                    fetched.records.len(),
                    page
                );
                records.extend(fetched.records);
            }
            Ok(Err(e)) => {
                log_error!(e => "[catalog] Error fetching page {}", page);
                failed_pages.push(page);
            }
            Err(join_error) => {
                log_error!("[catalog] Page {} task failed: {}", page, join_error);
                failed_pages.push(page);
            }
        }
    }

    if !failed_pages.is_empty() {
        failed_pages.sort_unstable();
        log_warn!(
            "[catalog] {} pages failed and were skipped: {:?}",
            failed_pages.len(),
            failed_pages
        );
    }
    log_info!("[catalog] Total {} vehicles scraped: {}", name, records.len());

    Ok(CatalogRun::Complete(CatalogReport {
        records,
        total_pages,
        failed_pages,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClientError, ScraperError};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    enum Outcome {
        Records(Vec<String>),
        Fails,
        Panics,
    }

    struct FakeSource {
        first_page: u32,
        total_pages: u32,
        pages: HashMap<u32, Outcome>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeSource {
        fn new(first_page: u32, total_pages: u32, pages: Vec<(u32, Outcome)>) -> Arc<Self> {
            Arc::new(Self {
                first_page,
                total_pages,
                pages: pages.into_iter().collect(),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }
    }

    fn records(page: u32, count: usize) -> Outcome {
        Outcome::Records((0..count).map(|i| format!("p{page}-r{i}")).collect())
    }

    #[async_trait]
    impl CatalogSource for FakeSource {
        type Record = String;

        fn name(&self) -> &'static str {
            "fake"
        }

        fn first_page(&self) -> u32 {
            self.first_page
        }

        async fn fetch_page(&self, page: u32) -> Result<CatalogPage<String>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.pages.get(&page) {
                Some(Outcome::Records(records)) => Ok(CatalogPage {
                    records: records.clone(),
                    total_pages: self.total_pages,
                }),
                Some(Outcome::Fails) => Err(ClientError::RetriesExhausted {
                    url: format!("https://fake/{page}"),
                    attempts: 3,
                    last_error: "Response error 502".into(),
                }
                .into()),
                Some(Outcome::Panics) => panic!("worker blew up on page {page}"),
                None => Err(ScraperError::ParseError(format!("no page {page}")).into()),
            }
        }
    }

    fn complete<R>(run: CatalogRun<R>) -> CatalogReport<R> {
        match run {
            CatalogRun::Complete(report) => report,
            CatalogRun::Empty => panic!("expected a complete run"),
        }
    }

    #[test]
    fn page_count_accepts_numbers_and_strings() {
        assert_eq!(page_count(&serde_json::json!(12)), 12);
        assert_eq!(page_count(&serde_json::json!("7")), 7);
        assert_eq!(page_count(&serde_json::json!(null)), 0);
        assert_eq!(page_count(&serde_json::json!(-3)), 0);
    }

    #[tokio::test]
    async fn aggregates_every_page() {
        let source = FakeSource::new(
            1,
            3,
            vec![(1, records(1, 5)), (2, records(2, 5)), (3, records(3, 5))],
        );

        let report = complete(fetch_catalog(source, 10).await.unwrap());
        assert_eq!(report.records.len(), 15);
        assert_eq!(report.total_pages, 3);
        assert!(report.failed_pages.is_empty());
    }

    #[tokio::test]
    async fn failed_pages_contribute_nothing() {
        let source = FakeSource::new(
            1,
            5,
            vec![
                (1, records(1, 4)),
                (2, records(2, 4)),
                (3, Outcome::Fails),
                (4, Outcome::Panics),
                (5, records(5, 2)),
            ],
        );

        let report = complete(fetch_catalog(source, 2).await.unwrap());
        assert_eq!(report.records.len(), 10);
        assert_eq!(report.failed_pages, vec![3, 4]);
        assert!(report.records.iter().all(|r| !r.starts_with("p3-")));
    }

    #[tokio::test]
    async fn empty_first_page_ends_the_run() {
        let source = FakeSource::new(1, 4, vec![(1, Outcome::Records(Vec::new()))]);
        let run = fetch_catalog(Arc::clone(&source), 4).await.unwrap();

        assert!(matches!(run, CatalogRun::Empty));
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn first_page_failure_is_terminal() {
        let source = FakeSource::new(0, 3, vec![(0, Outcome::Fails)]);
        assert!(fetch_catalog(source, 4).await.is_err());
    }

    #[tokio::test]
    async fn never_exceeds_worker_count() {
        let pages = (1..=30).map(|page| (page, records(page, 1))).collect();
        let source = FakeSource::new(1, 30, pages);

        let report = complete(fetch_catalog(Arc::clone(&source), 3).await.unwrap());
        assert_eq!(report.records.len(), 30);
        assert!(source.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn starts_after_page_zero_at_page_two() {
        let source = FakeSource::new(
            0,
            3,
            vec![(0, records(0, 2)), (2, records(2, 2)), (3, records(3, 2))],
        );

        let report = complete(fetch_catalog(source, 10).await.unwrap());
        assert_eq!(report.records.len(), 6);
        assert!(report.records.iter().all(|r| !r.starts_with("p1-")));
    }
}
