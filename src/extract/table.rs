use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::{validate, Extractor, Parish};
use crate::text::{
    clean_text, element_text, looks_like_address, looks_like_city, non_empty, normalize_phone,
};

const METHOD: &str = "table";
const CONFIDENCE: f64 = 0.85;
const TABLE_KEYWORDS: &[&str] = &["parish", "church", "name"];

static TABLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td, th").unwrap());
static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Tabular listings: first column is the parish name, remaining columns are
/// scanned for the first phone-, address-, city- and link-shaped values.
pub struct Table;

impl Extractor for Table {
    fn method(&self) -> &'static str {
        METHOD
    }

    fn extract(&self, doc: &Html, _url: &str) -> Vec<Parish> {
        let mut parishes = Vec::new();
        for table in doc.select(&TABLE_SEL) {
            let text = element_text(table).to_lowercase();
            if !TABLE_KEYWORDS.iter().any(|k| text.contains(k)) {
                continue;
            }
            parishes.extend(parishes_from_table(table));
        }
        validate::dedup(parishes)
    }
}

fn parishes_from_table(table: ElementRef) -> Vec<Parish> {
    let rows: Vec<_> = table.select(&ROW_SEL).collect();
    // First row is the header unless it is the only one.
    let data_rows = if rows.len() > 1 { &rows[1..] } else { &rows[..] };
    data_rows
        .iter()
        .filter_map(|row| parish_from_row(*row))
        .collect()
}

fn parish_from_row(row: ElementRef) -> Option<Parish> {
    let cells: Vec<_> = row.select(&CELL_SEL).collect();
    let name = clean_text(&element_text(*cells.first()?));
    if !validate::is_plausible_name(&name) {
        return None;
    }

    let mut city = None;
    let mut address = None;
    let mut phone = None;
    let mut website = None;
    for cell in &cells[1..] {
        let text = element_text(*cell);
        if phone.is_none() {
            phone = normalize_phone(&text);
        }
        if address.is_none() && looks_like_address(&text) {
            address = non_empty(clean_text(&text));
        }
        if city.is_none() && looks_like_city(&text) {
            city = non_empty(clean_text(&text));
        }
        if website.is_none() {
            website = cell
                .select(&ANCHOR_SEL)
                .filter_map(|a| a.value().attr("href"))
                .find(|href| href.starts_with("http"))
                .map(str::to_string);
        }
    }

    Some(Parish {
        name,
        city,
        address,
        phone,
        website,
        latitude: None,
        longitude: None,
        confidence: CONFIDENCE,
        extraction_method: METHOD,
    })
}

// ── Tests ──
