use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::{validate, Extractor, Parish};
use crate::text::{clean_text, element_text, non_empty, normalize_phone, parse_coordinates};

const METHOD: &str = "parish_finder";
const CONFIDENCE: f64 = 0.9;

static SITE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("li.site").unwrap());
static NAME_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.name").unwrap());
static CITY_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.city").unwrap());
static SITE_INFO_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.siteInfo").unwrap());
static TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.title").unwrap());
static ADDRESS_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.address").unwrap());
static PHONE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span.phone").unwrap());
static LINK_CONTAINER_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.linkContainer").unwrap());
static URL_LINK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a.urlLink").unwrap());

/// eCatholic-style parish finder: one `li.site` per parish with structured
/// name/city children, a nested `siteInfo` detail block, and coordinates in
/// data attributes on the site element.
pub struct ParishFinder;

impl Extractor for ParishFinder {
    fn method(&self) -> &'static str {
        METHOD
    }

    fn extract(&self, doc: &Html, _url: &str) -> Vec<Parish> {
        let parishes = doc.select(&SITE_SEL).filter_map(parish_from_site).collect();
        validate::dedup(parishes)
    }
}

fn parish_from_site(site: ElementRef) -> Option<Parish> {
    let name = clean_text(&element_text(site.select(&NAME_SEL).next()?));
    if !validate::is_plausible_name(&name) {
        return None;
    }

    let city = site
        .select(&CITY_SEL)
        .next()
        .and_then(|el| non_empty(clean_text(&element_text(el))));

    let mut address = None;
    let mut phone = None;
    let mut website = None;
    if let Some(info) = site.select(&SITE_INFO_SEL).next() {
        if let Some(title) = info.select(&TITLE_SEL).next() {
            address = title
                .select(&ADDRESS_SEL)
                .next()
                .and_then(|el| non_empty(clean_text(&element_text(el))));
            phone = title
                .select(&PHONE_SEL)
                .next()
                .and_then(|el| normalize_phone(&element_text(el)));
        }
        website = info
            .select(&LINK_CONTAINER_SEL)
            .next()
            .and_then(|container| container.select(&URL_LINK_SEL).next())
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string);
    }

    let (latitude, longitude) = parse_coordinates(site);

    Some(Parish {
        name,
        city,
        address,
        phone,
        website,
        latitude,
        longitude,
        confidence: CONFIDENCE,
        extraction_method: METHOD,
    })
}

// ── Tests ──
