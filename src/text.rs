use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;

static PHONE_SEP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(?(\d{3})\)?[-.\s]?(\d{3})[-.\s]?(\d{4})").unwrap());
static PHONE_DOT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{3})\.(\d{3})\.(\d{4})").unwrap());
static PHONE_BARE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{10})").unwrap());
static DIGIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d").unwrap());
static STREET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:st|street|ave|avenue|rd|road|dr|drive|ln|lane|blvd|boulevard|way|circle|court|ct)\b")
        .unwrap()
});

const CITY_NOISE: &[&str] = &["http", "www", "@", ".com"];

/// Collapse whitespace runs and trim.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `Some(s)` unless the string is empty after trimming.
pub fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Find the first phone-shaped substring and normalize it to `(AAA) BBB-CCCC`.
pub fn normalize_phone(text: &str) -> Option<String> {
    for re in [&*PHONE_SEP_RE, &*PHONE_DOT_RE] {
        if let Some(caps) = re.captures(text) {
            return Some(format!("({}) {}-{}", &caps[1], &caps[2], &caps[3]));
        }
    }
    PHONE_BARE_RE.captures(text).map(|caps| {
        let digits = &caps[1];
        format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..])
    })
}

/// Concatenated text of every text node under the element.
pub fn element_text(el: ElementRef) -> String {
    el.text().collect()
}

/// Non-empty trimmed lines of the element's text, in document order.
pub fn text_lines(el: ElementRef) -> Vec<String> {
    element_text(el)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read latitude/longitude from the element's data attributes. A coordinate
/// of exactly zero is a data-entry sentinel and counts as absent; the pair is
/// kept only when both values are present.
pub fn parse_coordinates(el: ElementRef) -> (Option<f64>, Option<f64>) {
    let lat = coordinate_attr(el, &["data-latitude", "data-lat"]);
    let lng = coordinate_attr(el, &["data-longitude", "data-lng", "data-lon"]);
    match (lat, lng) {
        (Some(lat), Some(lng)) => (Some(lat), Some(lng)),
        _ => (None, None),
    }
}

fn coordinate_attr(el: ElementRef, names: &[&str]) -> Option<f64> {
    let raw = names.iter().find_map(|name| el.value().attr(name))?;
    let value: f64 = raw.trim().parse().ok()?;
    (value != 0.0).then_some(value)
}

/// Street-address shape: a digit plus a street-suffix token.
pub fn looks_like_address(text: &str) -> bool {
    let text = text.trim();
    text.len() >= 5 && DIGIT_RE.is_match(text) && STREET_RE.is_match(text)
}

/// City shape: short, no digits, not an address, no URL/email markers.
pub fn looks_like_city(text: &str) -> bool {
    let text = text.trim();
    let lower = text.to_lowercase();
    text.len() > 5
        && text.len() < 30
        && !DIGIT_RE.is_match(text)
        && !looks_like_address(text)
        && !CITY_NOISE.iter().any(|marker| lower.contains(marker))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn with_div<T>(html: &str, f: impl FnOnce(ElementRef) -> T) -> T {
        let doc = Html::parse_fragment(html);
        let sel = Selector::parse("div").unwrap();
        f(doc.select(&sel).next().unwrap())
    }

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  Hello World  "), "Hello World");
        assert_eq!(clean_text("Hello    World"), "Hello World");
        assert_eq!(clean_text("Hello\n\tWorld"), "Hello World");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn phone_formats() {
        assert_eq!(normalize_phone("(216) 555-1234").as_deref(), Some("(216) 555-1234"));
        assert_eq!(normalize_phone("216-555-1234").as_deref(), Some("(216) 555-1234"));
        assert_eq!(normalize_phone("216.555.1234").as_deref(), Some("(216) 555-1234"));
        assert_eq!(normalize_phone("2165551234").as_deref(), Some("(216) 555-1234"));
    }

    #[test]
    fn phone_embedded_in_text() {
        assert_eq!(
            normalize_phone("Call us at (216) 555-1234 today").as_deref(),
            Some("(216) 555-1234")
        );
    }

    #[test]
    fn phone_absent() {
        assert_eq!(normalize_phone("No phone here"), None);
        assert_eq!(normalize_phone(""), None);
    }

    #[test]
    fn coordinates_parsed() {
        let (lat, lng) = with_div(
            r#"<div data-latitude="41.123" data-longitude="-81.456"></div>"#,
            parse_coordinates,
        );
        assert_eq!(lat, Some(41.123));
        assert_eq!(lng, Some(-81.456));
    }

    #[test]
    fn coordinates_alternate_attrs() {
        let (lat, lng) = with_div(
            r#"<div data-lat="41.5" data-lon="-81.5"></div>"#,
            parse_coordinates,
        );
        assert_eq!(lat, Some(41.5));
        assert_eq!(lng, Some(-81.5));
    }

    #[test]
    fn coordinates_zero_sentinel() {
        let (lat, lng) = with_div(
            r#"<div data-latitude="0.0" data-longitude="0.0"></div>"#,
            parse_coordinates,
        );
        assert_eq!(lat, None);
        assert_eq!(lng, None);
    }

    #[test]
    fn coordinates_missing_or_partial() {
        let (lat, lng) = with_div("<div></div>", parse_coordinates);
        assert_eq!((lat, lng), (None, None));

        // One valid coordinate alone is dropped: both present or both absent.
        let (lat, lng) = with_div(r#"<div data-latitude="41.1"></div>"#, parse_coordinates);
        assert_eq!((lat, lng), (None, None));

        let (lat, lng) = with_div(
            r#"<div data-latitude="41.1" data-longitude="0.0"></div>"#,
            parse_coordinates,
        );
        assert_eq!((lat, lng), (None, None));
    }

    #[test]
    fn address_shapes() {
        assert!(looks_like_address("123 Main St"));
        assert!(looks_like_address("4501 Lincoln Boulevard, Cleveland"));
        assert!(!looks_like_address("Main Street")); // no digit
        assert!(!looks_like_address("123"));
        assert!(!looks_like_address(""));
    }

    #[test]
    fn city_shapes() {
        assert!(looks_like_city("Cleveland"));
        assert!(looks_like_city("Salt Lake City"));
        assert!(!looks_like_city("Akron")); // too short
        assert!(!looks_like_city("123 Main St"));
        assert!(!looks_like_city("www.example.com"));
        assert!(!looks_like_city("A very long line that cannot be a city name"));
    }
}
