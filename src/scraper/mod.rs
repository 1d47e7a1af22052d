mod details;
mod vehicles;

pub use details::DetailScraper;
pub use vehicles::{VehicleField, VehicleRecord, VehicleScraper};

#[cfg(test)]
pub(crate) use vehicles::vehicle_row;

use crate::error::{Result, ScraperError};
use scraper::{Html, Selector};

pub struct Scraper {
    document: Html,
}

impl Scraper {
    pub fn new(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }

    /// Parses a fragment of bare `<tr>` rows, as returned by the vehicle
    /// list endpoint. HTML5 tree construction drops table rows found outside
    /// a table, so the fragment is wrapped in one unless it is a table
    /// itself. Tables nested inside cells do not count.
    pub fn from_rows(html: &str) -> Self {
        let is_table = html
            .trim_start()
            .get(..6)
            .is_some_and(|tag| tag.eq_ignore_ascii_case("<table"));
        if is_table {
            Self::new(html)
        } else {
            Self::new(&format!("<table>{}</table>", html))
        }
    }

    pub fn vehicles(&self) -> VehicleScraper {
        VehicleScraper::new(&self.document)
    }

    pub fn details(&self) -> DetailScraper {
        DetailScraper::new(&self.document)
    }
}

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| ScraperError::SelectorError(format!("{}: {}", css, e)).into())
}
