use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::{validate, Extractor, Parish};
use crate::text::{clean_text, element_text, non_empty, normalize_phone, text_lines};

const METHOD: &str = "card_layout";
const CONFIDENCE: f64 = 0.8;
const MAX_CITY_LEN: usize = 50;
const SOCIAL_HOSTS: &[&str] = &["facebook", "twitter", "instagram"];

// Checked in priority order; the first selector that matches anything wins
// and results are never merged across selectors.
static CARD_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        "div.col-lg.location",
        r#"[class*="parish-card"]"#,
        r#"[class*="location-card"]"#,
        r#"[class*="church-card"]"#,
        ".card",
    ]
    .iter()
    .map(|s| Selector::parse(s).unwrap())
    .collect()
});
static TITLED_HEADING_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h3, h4, h5").unwrap());
static ANY_HEADING_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5").unwrap());
static CARD_BODY_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.card-body").unwrap());
static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Card-grid layouts (Salt Lake City style): one card per parish with a
/// heading title, a free-text body, and an outbound link.
pub struct CardLayout;

impl Extractor for CardLayout {
    fn method(&self) -> &'static str {
        METHOD
    }

    fn extract(&self, doc: &Html, _url: &str) -> Vec<Parish> {
        let cards = CARD_SELECTORS
            .iter()
            .map(|sel| doc.select(sel).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default();

        let parishes = cards.into_iter().filter_map(parish_from_card).collect();
        validate::dedup(parishes)
    }
}

fn parish_from_card(card: ElementRef) -> Option<Parish> {
    let title = card
        .select(&TITLED_HEADING_SEL)
        .find(|h| h.value().attr("class").is_some_and(|c| c.contains("title")))
        .or_else(|| card.select(&ANY_HEADING_SEL).next())?;
    let name = clean_text(&element_text(title));
    if !validate::is_plausible_name(&name) {
        return None;
    }

    let city = city_from_card(card);
    let phone = normalize_phone(&element_text(card));
    let website = website_from_card(card);

    Some(Parish {
        name,
        city,
        address: None,
        phone,
        website,
        latitude: None,
        longitude: None,
        confidence: CONFIDENCE,
        extraction_method: METHOD,
    })
}

// The body's second non-empty line is usually the city, unless it is the
// "Learn More" affordance or too long to be one.
fn city_from_card(card: ElementRef) -> Option<String> {
    let body = card.select(&CARD_BODY_SEL).next()?;
    let lines = text_lines(body);
    let candidate = lines.get(1)?;
    if candidate.starts_with("Learn More") || candidate.len() >= MAX_CITY_LEN {
        return None;
    }
    non_empty(clean_text(candidate))
}

fn website_from_card(card: ElementRef) -> Option<String> {
    card.select(&ANCHOR_SEL)
        .filter_map(|a| a.value().attr("href"))
        .find(|href| {
            let lower = href.to_lowercase();
            href.starts_with("http") && !SOCIAL_HOSTS.iter().any(|host| lower.contains(host))
        })
        .map(str::to_string)
}

// ── Tests ──
