use super::{Client, RequestStats, RetryPolicy};
use crate::error::{ClientError, Result};
use crate::proxy::ProxyMap;
use http::{
    header::{HeaderMap, HeaderName},
    HeaderValue,
};
use rquest::{Client as RquestClient, Impersonate};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

pub struct ClientBuilder {
    base_url: Option<String>,
    proxies: ProxyMap,
    chrome_impersonation: bool,
    headers: HeaderMap,
    timeout: Duration,
    retry: RetryPolicy,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            proxies: ProxyMap::default(),
            chrome_impersonation: false,
            headers: HeaderMap::new(),
            timeout: Duration::from_secs(45),
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn proxies(mut self, proxies: ProxyMap) -> Self {
        self.proxies = proxies;
        self
    }

    pub fn chrome_impersonation(mut self, enabled: bool) -> Self {
        self.chrome_impersonation = enabled;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn header<K, V>(mut self, key: K, value: V) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let header_name = HeaderName::from_str(key.as_ref())
            .map_err(|e| ClientError::BuildError(format!("Invalid header name: {}", e)))?;

        let header_value = HeaderValue::from_str(value.as_ref())
            .map_err(|e| ClientError::BuildError(format!("Invalid header value: {}", e)))?;

        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// Adds a fixed header set, as vendors expect it from their own frontend.
    pub fn headers<'a, I, K, V>(self, headers: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a (K, V)>,
        K: AsRef<str> + 'a,
        V: AsRef<str> + 'a,
    {
        headers
            .into_iter()
            .try_fold(self, |builder, (key, value)| builder.header(key, value))
    }

    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::BuildError("Base URL is required".to_string()))?;

        let base_url = Url::parse(&base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("Invalid base URL: {}", e)))?;

        let mut client_builder = RquestClient::builder();

        for proxy in self.proxies.to_proxies()? {
            client_builder = client_builder.proxy(proxy);
        }

        if self.chrome_impersonation {
            client_builder = client_builder.impersonate(Impersonate::Chrome131);
        }

        let mut inner = client_builder
            .build()
            .map_err(|e| ClientError::BuildError(format!("Failed to build client: {}", e)))?;

        // The vendor header set replaces the impersonation defaults.
        if !self.headers.is_empty() {
            *inner.as_mut().headers() = self.headers;
        }

        Ok(Client {
            inner,
            base_url,
            timeout: self.timeout,
            retry: self.retry,
            stats: Mutex::new(RequestStats::new()),
        })
    }
}
