use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Scraping error: {0}")]
    Scraper(#[from] ScraperError),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request error: {0}")]
    Request(#[from] rquest::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Failed to build client: {0}")]
    BuildError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Response error {status_code}: {message}")]
    ResponseError { status_code: u16, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Giving up on {url} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },
}

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Selector error: {0}")]
    SelectorError(String),
}

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Navigation to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    #[error("Failed to read page content: {0}")]
    Content(String),
}

impl AppError {
    /// Short tag used as the `kind` field in structured error logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Client(_) => "client",
            AppError::Scraper(_) => "scraper",
            AppError::Browser(_) => "browser",
            AppError::Io(_) => "io",
            AppError::Request(_) => "request",
            AppError::Serde(_) => "serde",
            AppError::Csv(_) => "csv",
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
