use std::collections::BTreeMap;

/// Counters for every attempt a client makes during one run.
#[derive(Debug, Default)]
pub struct RequestStats {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub status_codes: BTreeMap<u16, usize>,
    /// Latest failure reason per URL; retries of one URL share an entry.
    pub failed_urls: BTreeMap<String, String>,
}

impl RequestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, status_code: u16) {
        self.total_requests += 1;
        self.successful_requests += 1;
        *self.status_codes.entry(status_code).or_default() += 1;
    }

    pub fn record_failure(&mut self, url: String, reason: String, status_code: Option<u16>) {
        self.total_requests += 1;
        self.failed_requests += 1;
        if let Some(code) = status_code {
            *self.status_codes.entry(code).or_default() += 1;
        }
        self.failed_urls.insert(url, reason);
    }
}
