use super::selector;
use crate::error::Result;
pub use crate::log_warn;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};

const DEFINITION_LIST: (&str, &str) = ("dl", "vehicle-card-dl");
const ICON_LIST: (&str, &str) = ("ul", "vehicle-card-icon-list");

/// Heading kinds in the order their sections are merged. Only `h3`
/// subtitles may fall back to an icon list.
const SECTION_HEADINGS: [(&str, bool); 3] = [
    ("h2.vehicle-card-subtitle", false),
    ("h2.vehicle-card-title", false),
    ("h3.vehicle-card-subtitle", true),
];

/// Reads the labelled attribute sections of a rendered vehicle page.
pub struct DetailScraper<'a> {
    document: &'a Html,
}

impl<'a> DetailScraper<'a> {
    pub(crate) fn new(document: &'a Html) -> Self {
        Self { document }
    }

    /// Collects every `dt`/`dd` pair of every section into one map. A label
    /// seen in a later section replaces the value from an earlier one.
    pub fn extract_details(&self) -> Result<Map<String, Value>> {
        let term = selector("dt")?;
        let definition = selector("dd")?;
        let mut details = Map::new();

        for (heading_css, list_fallback) in SECTION_HEADINGS {
            let headings: Selector = selector(heading_css)?;
            for heading in self.document.select(&headings) {
                if let Some(list) = next_sibling(heading, DEFINITION_LIST) {
                    let pairs = list.select(&term).zip(list.select(&definition));
                    for (dt, dd) in pairs {
                        details.insert(text_of(dt), Value::String(text_of(dd)));
                    }
                    continue;
                }

                if list_fallback {
                    if let Some(icons) = next_sibling(heading, ICON_LIST) {
                        details.insert(text_of(heading), Value::String(icons.html()));
                        continue;
                    }
                }

                log_warn!(
                    "[scraper] No attribute list after heading '{}' ({})",
                    text_of(heading),
                    heading_css
                );
            }
        }

        Ok(details)
    }
}

/// First following sibling element with the given tag and class, not
/// necessarily the adjacent one.
fn next_sibling<'a>(heading: ElementRef<'a>, (tag, class): (&str, &str)) -> Option<ElementRef<'a>> {
    heading
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == tag && el.value().classes().any(|c| c == class))
}

fn text_of(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::Scraper;

    fn details(html: &str) -> Map<String, Value> {
        Scraper::new(html).details().extract_details().unwrap()
    }

    #[test]
    fn merges_definition_lists_in_order() {
        let page = r#"<div class="vehicle-card">
            <h2 class="vehicle-card-title">Audi A4</h2>
            <dl class="vehicle-card-dl"><dt>Engine</dt><dd>2.0 TDI</dd><dt>Power</dt><dd> 150 hp </dd></dl>
            <h2 class="vehicle-card-subtitle">ECU</h2>
            <dl class="vehicle-card-dl"><dt>ECU</dt><dd>Bosch EDC17C64</dd></dl>
        </div>"#;

        let details = details(page);
        assert_eq!(details["ECU"], "Bosch EDC17C64");
        assert_eq!(details["Power"], "150 hp");
        assert_eq!(details.len(), 3);
    }

    #[test]
    fn later_section_wins_on_same_label() {
        let page = r#"<section>
            <h2 class="vehicle-card-subtitle">Engine data</h2>
            <dl class="vehicle-card-dl"><dt>Engine</dt><dd>first</dd></dl>
        </section>
        <section>
            <h3 class="vehicle-card-subtitle">Engine data (update)</h3>
            <dl class="vehicle-card-dl"><dt>Engine</dt><dd>second</dd></dl>
        </section>"#;

        let details = details(page);
        assert_eq!(details["Engine"], "second");
        assert_eq!(details.len(), 1);
    }

    #[test]
    fn h3_without_list_falls_back_to_icon_list() {
        let page = r#"<div>
            <h3 class="vehicle-card-subtitle"> Supported tools </h3>
            <ul class="vehicle-card-icon-list"><li><img src="/kess3.svg">KESS3</li></ul>
        </div>"#;

        let details = details(page);
        let icons = details["Supported tools"].as_str().unwrap();
        assert!(icons.starts_with("<ul class=\"vehicle-card-icon-list\">"));
        assert!(icons.contains("KESS3"));
    }

    #[test]
    fn h2_never_uses_icon_list() {
        let page = r#"<div>
            <h2 class="vehicle-card-subtitle">Tools</h2>
            <ul class="vehicle-card-icon-list"><li>KESS3</li></ul>
        </div>"#;

        assert!(details(page).is_empty());
    }

    #[test]
    fn page_without_sections_yields_nothing() {
        assert!(details("<html><body><p>Not found</p></body></html>").is_empty());
    }
}
