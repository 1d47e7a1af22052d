use super::selector;
use crate::error::Result;
pub use crate::{log_debug, log_warn};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Rows with fewer cells than this are not vehicle entries.
pub const MIN_COLUMNS: usize = 9;

const ROW_SELECTOR: &str = "tr.vehicle-list-table-row";
const NAVIGATION_PREFIX: &str = "window.location='";

/// One AlienTech catalog row. The serde names are the CSV column headers,
/// which the detail phase reads back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleRecord {
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "Vehicle Type")]
    pub vehicle_type: String,
    #[serde(rename = "Brand")]
    pub brand: String,
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Year")]
    pub year: String,
    #[serde(rename = "Fuel")]
    pub fuel: String,
    #[serde(rename = "Engine Code")]
    pub engine_code: String,
    #[serde(rename = "Tools Text")]
    pub tools_text: String,
    #[serde(rename = "Tools Images")]
    pub tools_images: String,
    #[serde(rename = "Connection Modes Text")]
    pub connection_modes_text: String,
    #[serde(rename = "Connection Modes Images")]
    pub connection_modes_images: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleField {
    Url,
    VehicleType,
    Brand,
    Model,
    Version,
    Year,
    Fuel,
    EngineCode,
    ToolsText,
    ToolsImages,
    ConnectionModesText,
    ConnectionModesImages,
}

impl VehicleField {
    pub const ALL: [VehicleField; 12] = [
        VehicleField::Url,
        VehicleField::VehicleType,
        VehicleField::Brand,
        VehicleField::Model,
        VehicleField::Version,
        VehicleField::Year,
        VehicleField::Fuel,
        VehicleField::EngineCode,
        VehicleField::ToolsText,
        VehicleField::ToolsImages,
        VehicleField::ConnectionModesText,
        VehicleField::ConnectionModesImages,
    ];

    pub fn column(self) -> &'static str {
        match self {
            VehicleField::Url => "URL",
            VehicleField::VehicleType => "Vehicle Type",
            VehicleField::Brand => "Brand",
            VehicleField::Model => "Model",
            VehicleField::Version => "Version",
            VehicleField::Year => "Year",
            VehicleField::Fuel => "Fuel",
            VehicleField::EngineCode => "Engine Code",
            VehicleField::ToolsText => "Tools Text",
            VehicleField::ToolsImages => "Tools Images",
            VehicleField::ConnectionModesText => "Connection Modes Text",
            VehicleField::ConnectionModesImages => "Connection Modes Images",
        }
    }
}

impl VehicleRecord {
    pub fn get(&self, field: VehicleField) -> &str {
        match field {
            VehicleField::Url => &self.url,
            VehicleField::VehicleType => &self.vehicle_type,
            VehicleField::Brand => &self.brand,
            VehicleField::Model => &self.model,
            VehicleField::Version => &self.version,
            VehicleField::Year => &self.year,
            VehicleField::Fuel => &self.fuel,
            VehicleField::EngineCode => &self.engine_code,
            VehicleField::ToolsText => &self.tools_text,
            VehicleField::ToolsImages => &self.tools_images,
            VehicleField::ConnectionModesText => &self.connection_modes_text,
            VehicleField::ConnectionModesImages => &self.connection_modes_images,
        }
    }

    fn set(&mut self, field: VehicleField, value: String) {
        let slot = match field {
            VehicleField::Url => &mut self.url,
            VehicleField::VehicleType => &mut self.vehicle_type,
            VehicleField::Brand => &mut self.brand,
            VehicleField::Model => &mut self.model,
            VehicleField::Version => &mut self.version,
            VehicleField::Year => &mut self.year,
            VehicleField::Fuel => &mut self.fuel,
            VehicleField::EngineCode => &mut self.engine_code,
            VehicleField::ToolsText => &mut self.tools_text,
            VehicleField::ToolsImages => &mut self.tools_images,
            VehicleField::ConnectionModesText => &mut self.connection_modes_text,
            VehicleField::ConnectionModesImages => &mut self.connection_modes_images,
        };
        *slot = value;
    }

    /// The record as an ordered column map, ready for detail attributes to
    /// be merged in.
    pub fn to_row(&self) -> Map<String, Value> {
        VehicleField::ALL
            .iter()
            .map(|field| (field.column().to_string(), Value::from(self.get(*field))))
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
enum Extract {
    /// Trimmed text of the whole cell.
    Text,
    /// Text of every `li`, joined with ", ".
    ListText,
    /// `src` of every `img`, joined with ", ".
    ImageSources,
}

/// Column index of the row cell each field is read from.
const COLUMN_RULES: [(usize, Extract, VehicleField); 11] = [
    (0, Extract::Text, VehicleField::VehicleType),
    (1, Extract::Text, VehicleField::Brand),
    (2, Extract::Text, VehicleField::Model),
    (3, Extract::Text, VehicleField::Version),
    (4, Extract::Text, VehicleField::Year),
    (5, Extract::Text, VehicleField::Fuel),
    (6, Extract::Text, VehicleField::EngineCode),
    (7, Extract::ListText, VehicleField::ToolsText),
    (7, Extract::ImageSources, VehicleField::ToolsImages),
    (8, Extract::ListText, VehicleField::ConnectionModesText),
    (8, Extract::ImageSources, VehicleField::ConnectionModesImages),
];

pub struct VehicleScraper<'a> {
    document: &'a Html,
}

struct CellSelectors {
    cell: Selector,
    list_item: Selector,
    image: Selector,
}

impl<'a> VehicleScraper<'a> {
    pub(crate) fn new(document: &'a Html) -> Self {
        Self { document }
    }

    pub fn extract_vehicles(&self) -> Result<Vec<VehicleRecord>> {
        let rows = selector(ROW_SELECTOR)?;
        let selectors = CellSelectors {
            cell: selector("td")?,
            list_item: selector("li")?,
            image: selector("img")?,
        };

        let mut vehicles = Vec::new();
        for (index, row) in self.document.select(&rows).enumerate() {
            let cells: Vec<ElementRef> = row.select(&selectors.cell).collect();
            if cells.len() < MIN_COLUMNS {
                log_warn!(
                    "[scraper] Skipping row {}: {} columns, expected at least {}",
                    index,
                    cells.len(),
                    MIN_COLUMNS
                );
                continue;
            }
            vehicles.push(self.extract_vehicle(row, &cells, &selectors, index));
        }

        log_debug!("[scraper] Extracted {} vehicles", vehicles.len());
        Ok(vehicles)
    }

    fn extract_vehicle(
        &self,
        row: ElementRef,
        cells: &[ElementRef],
        selectors: &CellSelectors,
        index: usize,
    ) -> VehicleRecord {
        let mut record = VehicleRecord {
            url: self.extract_url(row, index),
            ..VehicleRecord::default()
        };

        for (column, extract, field) in COLUMN_RULES {
            let Some(cell) = cells.get(column) else {
                continue;
            };
            let value = match extract {
                Extract::Text => cell_text(*cell),
                Extract::ListText => cell
                    .select(&selectors.list_item)
                    .map(|li| cell_text(li).replace('\n', " "))
                    .collect::<Vec<_>>()
                    .join(", "),
                Extract::ImageSources => cell
                    .select(&selectors.image)
                    .filter_map(|img| img.value().attr("src"))
                    .collect::<Vec<_>>()
                    .join(", "),
            };
            record.set(field, value);
        }

        record
    }

    fn extract_url(&self, row: ElementRef, index: usize) -> String {
        match row.value().attr("onclick") {
            Some(onclick) => onclick.replace(NAVIGATION_PREFIX, "").replace('\'', ""),
            None => {
                log_warn!("[scraper] Row {} has no onclick target, URL left empty", index);
                String::new()
            }
        }
    }
}

fn cell_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
pub(crate) fn vehicle_row(url: &str, model: &str) -> String {
    format!(
        r#"<tr class="vehicle-list-table-row" onclick="window.location='{url}'">
            <td> Car </td><td>Audi</td><td>{model}</td><td>2.0 TDI</td><td>2016</td>
            <td>Diesel</td><td>CRLB</td>
            <td><ul><li>KESS3
                Master</li><li>K-TAG</li></ul><img src="/img/kess3.png"><img src="/img/ktag.png"></td>
            <td><ul><li>OBD</li></ul><img src="/img/obd.svg"></td>
        </tr>"#
    )
}
