use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;

use crate::text::element_text;

static CARD_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(card.*location|location.*card|parish.*card)").unwrap());

static FINDER_SITE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li.site").unwrap());
static CLASSED_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("[class]").unwrap());
static CARD_SUBSTR_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"[class*="parish-card"], [class*="location-card"]"#).unwrap()
});
static TABLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static MAP_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("#map, .map").unwrap());

const FINDER_URL_MARKERS: &[&str] = &["parishfinder", "parish-finder", "find-parish"];
const FINDER_HTML_MARKERS: &[&str] = &["finder.js", "parish finder", "findercore"];
const TABLE_KEYWORDS: &[&str] = &["parish", "church", "name", "address"];
const MAP_HTML_MARKERS: &[&str] = &["leaflet", "google.maps", "mapbox", "parish-map"];

/// Structural layout of a parish directory page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteType {
    ParishFinder,
    CardLayout,
    Table,
    Map,
    Generic,
}

impl SiteType {
    pub fn as_str(self) -> &'static str {
        match self {
            SiteType::ParishFinder => "parish_finder",
            SiteType::CardLayout => "card_layout",
            SiteType::Table => "table",
            SiteType::Map => "map",
            SiteType::Generic => "generic",
        }
    }
}

/// Decide which structural pattern a directory page follows.
///
/// Ordered decision list, first match wins. Finder markup is the most
/// specific and must be checked before the broader table/map heuristics,
/// which can false-positive on finder pages that happen to embed a map
/// widget. Pure function of document + URL.
pub fn classify(doc: &Html, url: &str) -> SiteType {
    let html = doc.root_element().html().to_lowercase();
    let url = url.to_lowercase();

    let is_finder = FINDER_URL_MARKERS.iter().any(|m| url.contains(m))
        || FINDER_HTML_MARKERS.iter().any(|m| html.contains(m))
        || doc.select(&FINDER_SITE_SEL).next().is_some();
    if is_finder {
        return SiteType::ParishFinder;
    }

    let is_cards = doc.select(&CLASSED_SEL).any(|el| {
        el.value()
            .attr("class")
            .is_some_and(|class| CARD_CLASS_RE.is_match(class) || class == "col-lg location")
    }) || doc.select(&CARD_SUBSTR_SEL).next().is_some();
    if is_cards {
        return SiteType::CardLayout;
    }

    for table in doc.select(&TABLE_SEL) {
        let text = element_text(table).to_lowercase();
        if TABLE_KEYWORDS.iter().any(|k| text.contains(k)) {
            return SiteType::Table;
        }
    }

    let is_map = MAP_HTML_MARKERS.iter().any(|m| html.contains(m))
        || doc.select(&MAP_SEL).next().is_some();
    if is_map {
        return SiteType::Map;
    }

    SiteType::Generic
}

// ── Tests ──
