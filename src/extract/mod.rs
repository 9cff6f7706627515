pub mod cards;
pub mod classify;
pub mod finder;
pub mod generic;
pub mod table;
pub mod validate;

use scraper::Html;
use serde::Serialize;

pub use classify::{classify, SiteType};

/// One extracted parish record. Only ever constructed with a name that has
/// passed the plausibility check; immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parish {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub confidence: f64,
    pub extraction_method: &'static str,
}

/// What one document's extraction run produced.
#[derive(Debug, Serialize)]
pub struct ExtractionOutcome {
    pub parishes: Vec<Parish>,
    pub site_type: SiteType,
    pub success: bool,
    pub errors: Vec<String>,
}

impl ExtractionOutcome {
    pub fn failed(site_type: SiteType, error: String) -> Self {
        Self {
            parishes: Vec::new(),
            site_type,
            success: false,
            errors: vec![error],
        }
    }
}

/// Uniform contract implemented by every extraction strategy. Implementations
/// run the shared validate/dedup pass before returning, so every record that
/// leaves an extractor carries a plausible, unique name.
pub trait Extractor: Sync {
    fn method(&self) -> &'static str;
    fn extract(&self, doc: &Html, url: &str) -> Vec<Parish>;
}

/// Registry keyed by site type. Total: map pages (which have no dedicated
/// extractor) and anything unrecognized fall back to the generic one.
pub fn extractor_for(site_type: SiteType) -> &'static dyn Extractor {
    match site_type {
        SiteType::ParishFinder => &finder::ParishFinder,
        SiteType::CardLayout => &cards::CardLayout,
        SiteType::Table => &table::Table,
        SiteType::Map | SiteType::Generic => &generic::Generic,
    }
}

/// Classify a page and run the matching extractor. Never fails: a page that
/// yields no records comes back as an unsuccessful outcome, not an error.
pub fn run_extraction(doc: &Html, url: &str) -> ExtractionOutcome {
    let site_type = classify(doc, url);
    let parishes = extractor_for(site_type).extract(doc, url);
    ExtractionOutcome {
        success: !parishes.is_empty(),
        parishes,
        site_type,
        errors: Vec::new(),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> Html {
        let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap();
        Html::parse_document(&html)
    }

    #[test]
    fn registry_is_total() {
        assert_eq!(extractor_for(SiteType::ParishFinder).method(), "parish_finder");
        assert_eq!(extractor_for(SiteType::CardLayout).method(), "card_layout");
        assert_eq!(extractor_for(SiteType::Table).method(), "table");
        assert_eq!(extractor_for(SiteType::Map).method(), "generic");
        assert_eq!(extractor_for(SiteType::Generic).method(), "generic");
    }

    #[test]
    fn finder_fixture_end_to_end() {
        let doc = fixture("finder");
        let outcome = run_extraction(&doc, "https://dioceseofcleveland.org/parishfinder");
        assert_eq!(outcome.site_type, SiteType::ParishFinder);
        assert!(outcome.success);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.parishes.len(), 2);

        let first = &outcome.parishes[0];
        assert_eq!(first.name, "St. Mary Parish");
        assert_eq!(first.city.as_deref(), Some("Cleveland"));
        assert_eq!(first.address.as_deref(), Some("123 Main St, Cleveland, OH 44111"));
        assert_eq!(first.phone.as_deref(), Some("(216) 555-1234"));
        assert_eq!(first.website.as_deref(), Some("https://stmary.org"));
        assert_eq!(first.latitude, Some(41.123));
        assert_eq!(first.longitude, Some(-81.456));
        assert!(outcome.parishes.iter().all(|p| p.confidence == 0.9));
        assert!(outcome.parishes.iter().all(|p| p.extraction_method == "parish_finder"));
    }

    #[test]
    fn cards_fixture_end_to_end() {
        let doc = fixture("cards");
        let outcome = run_extraction(&doc, "https://dioceseofslc.org/parishes");
        assert_eq!(outcome.site_type, SiteType::CardLayout);
        assert!(outcome.success);
        assert_eq!(outcome.parishes.len(), 3);
        assert!(outcome.parishes.iter().all(|p| p.confidence == 0.8));
        assert!(outcome.parishes.iter().all(|p| p.extraction_method == "card_layout"));
    }

    #[test]
    fn table_fixture_end_to_end() {
        let doc = fixture("table");
        let outcome = run_extraction(&doc, "https://archden.org/parishes");
        assert_eq!(outcome.site_type, SiteType::Table);
        assert!(outcome.success);
        let names: Vec<&str> = outcome.parishes.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["St. Joseph Church", "Holy Ghost Church", "Our Lady of Loreto Parish"]
        );
        assert!(outcome.parishes.iter().all(|p| p.confidence == 0.85));
    }

    #[test]
    fn generic_fixture_end_to_end() {
        let doc = fixture("generic");
        let outcome = run_extraction(&doc, "https://smalldiocese.org/communities");
        assert_eq!(outcome.site_type, SiteType::Generic);
        assert!(outcome.success);
        assert!(outcome.parishes.iter().all(|p| p.confidence == 0.4));
        assert!(outcome.parishes.iter().all(|p| p.extraction_method == "generic"));
    }

    #[test]
    fn no_skip_term_names_survive_any_fixture() {
        for name in ["finder", "cards", "table", "generic"] {
            let doc = fixture(name);
            let outcome = run_extraction(&doc, "https://example.org");
            for parish in &outcome.parishes {
                assert!(
                    validate::is_plausible_name(&parish.name),
                    "implausible name escaped: {}",
                    parish.name
                );
            }
        }
    }

    #[test]
    fn empty_page_is_unsuccessful() {
        let doc = Html::parse_document("<html><body><p>Nothing here</p></body></html>");
        let outcome = run_extraction(&doc, "https://example.org");
        assert!(!outcome.success);
        assert!(outcome.parishes.is_empty());
    }

    #[test]
    fn failed_outcome_carries_error() {
        let outcome = ExtractionOutcome::failed(SiteType::Generic, "page load failed".into());
        assert!(!outcome.success);
        assert_eq!(outcome.errors, vec!["page load failed".to_string()]);
    }

    #[test]
    fn absent_fields_are_omitted_from_json() {
        let parish = Parish {
            name: "St. Mary Parish".into(),
            city: None,
            address: None,
            phone: None,
            website: None,
            latitude: None,
            longitude: None,
            confidence: 0.9,
            extraction_method: "parish_finder",
        };
        let json = serde_json::to_value(&parish).unwrap();
        assert!(json.get("city").is_none());
        assert!(json.get("latitude").is_none());
        assert_eq!(json["name"], "St. Mary Parish");
        assert_eq!(json["extraction_method"], "parish_finder");
    }
}
