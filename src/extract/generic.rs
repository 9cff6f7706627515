use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::{validate, Extractor, Parish};
use crate::text::{
    clean_text, element_text, looks_like_address, non_empty, normalize_phone, text_lines,
};

const METHOD: &str = "generic";
const CONFIDENCE: f64 = 0.4;
// Bound the work on loosely-matching pages.
const MAX_ELEMENTS: usize = 15;
const MIN_ADDRESS_LEN: usize = 10;
const MAX_CITY_LEN: usize = 30;
const SOCIAL_HOSTS: &[&str] = &["facebook", "twitter", "instagram", "youtube"];

// Broad container selectors, tried in order. The first selector that matches
// anything is examined; later selectors are only tried while no valid record
// has been produced.
static CONTAINER_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        r#"[class*="parish"], [id*="parish"]"#,
        r#"[class*="church"], [id*="church"]"#,
        r#"[class*="location"], [id*="location"]"#,
        "article",
        ".entry",
        ".content-item",
        ".post",
    ]
    .iter()
    .map(|s| Selector::parse(s).unwrap())
    .collect()
});
static HEADING_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5").unwrap());
static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Fallback for unknown layouts: probe common container selectors and pull
/// fields out of free text. Weak structural assumptions, lowest confidence.
pub struct Generic;

impl Extractor for Generic {
    fn method(&self) -> &'static str {
        METHOD
    }

    fn extract(&self, doc: &Html, _url: &str) -> Vec<Parish> {
        for sel in CONTAINER_SELECTORS.iter() {
            let elements: Vec<_> = doc.select(sel).take(MAX_ELEMENTS).collect();
            if elements.is_empty() {
                continue;
            }
            let parishes: Vec<_> = elements
                .into_iter()
                .filter_map(parish_from_element)
                .collect();
            let parishes = validate::dedup(parishes);
            if !parishes.is_empty() {
                return parishes;
            }
        }
        Vec::new()
    }
}

fn parish_from_element(el: ElementRef) -> Option<Parish> {
    let name = clean_text(&element_text(el.select(&HEADING_SEL).next()?));
    if !validate::is_plausible_name(&name) {
        return None;
    }

    let phone = normalize_phone(&element_text(el));
    let website = website_from_element(el);
    let city = city_from_element(el);
    let address = address_from_element(el);

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

fn website_from_element(el: ElementRef) -> Option<String> {
    el.select(&ANCHOR_SEL)
        .filter_map(|a| a.value().attr("href"))
        .find(|href| {
            let lower = href.to_lowercase();
            href.starts_with("http") && !SOCIAL_HOSTS.iter().any(|host| lower.contains(host))
        })
        .map(str::to_string)
}

// A short bare line shortly after the name is usually the city.
fn city_from_element(el: ElementRef) -> Option<String> {
    let lines = text_lines(el);
    lines
        .iter()
        .skip(1)
        .take(3)
        .find(|line| {
            line.len() < MAX_CITY_LEN
                && !line.contains('@')
                && !line.contains("http")
                && !line.contains('(')
                && !line.contains(')')
                && line.split_whitespace().count() <= 3
        })
        .and_then(|line| non_empty(clean_text(line)))
}

fn address_from_element(el: ElementRef) -> Option<String> {
    text_lines(el)
        .iter()
        .find(|line| looks_like_address(line) && line.len() > MIN_ADDRESS_LEN)
        .and_then(|line| non_empty(clean_text(line)))
}

// ── Tests ──
