use std::sync::LazyLock;
use std::time::{Duration, Instant};

use anyhow::Result;
use rusqlite::Connection;
use scraper::{Html, Selector};
use serde::Serialize;
use spider_client::Spider;
use tracing::{debug, info, warn};

use crate::ai::Oracle;
use crate::config::Config;
use crate::db::{self, Diocese};
use crate::extract::{self, Parish, SiteType};
use crate::fetch;
use crate::sitemap;
use crate::text::{clean_text, element_text};

const MAX_SCORED_CANDIDATES: usize = 5;
const DIRECTORY_KEYWORDS: &[&str] = &[
    "parish",
    "church",
    "directory",
    "finder",
    "location",
    "worship",
    "mass",
    "congregation",
    "faith community",
];

static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// A potential parish-directory link found on a diocese page.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub url: String,
    pub text: String,
}

/// Per-diocese result of one pipeline pass. Serialized as-is into the JSON
/// report; absent fields are omitted.
#[derive(Debug, Serialize)]
pub struct DioceseOutcome {
    pub diocese_name: String,
    pub diocese_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory_url: Option<String>,
    pub site_type: SiteType,
    pub success: bool,
    pub parish_count: usize,
    pub saved_count: usize,
    pub processing_secs: f64,
    pub errors: Vec<String>,
    pub parishes: Vec<Parish>,
}

impl DioceseOutcome {
    fn failed(diocese: &Diocese, directory_url: Option<String>, error: String) -> Self {
        Self {
            diocese_name: diocese.name.clone(),
            diocese_url: diocese.url.clone(),
            directory_url,
            site_type: SiteType::Generic,
            success: false,
            parish_count: 0,
            saved_count: 0,
            processing_secs: 0.0,
            errors: vec![error],
            parishes: Vec::new(),
        }
    }
}

pub struct Pipeline<'a> {
    cfg: Config,
    conn: &'a Connection,
    spider: Spider,
    oracle: Oracle,
    http: reqwest::Client,
}

impl<'a> Pipeline<'a> {
    pub fn new(cfg: Config, conn: &'a Connection) -> Result<Self> {
        let spider = fetch::client(cfg.spider_api_key.as_deref())?;
        let oracle = Oracle::new(cfg.gemini_api_key.clone());
        if !oracle.enabled() {
            info!("No GEMINI_API_KEY set; candidate scoring uses the fixed mock score");
        }
        Ok(Self {
            cfg,
            conn,
            spider,
            oracle,
            http: reqwest::Client::new(),
        })
    }

    /// Process dioceses sequentially with a politeness delay between sites.
    /// Individual failures degrade that diocese's outcome and never abort
    /// the batch.
    pub async fn run(&self, limit: Option<usize>) -> Result<Vec<DioceseOutcome>> {
        let limit = limit.unwrap_or(self.cfg.max_dioceses);
        let dioceses = db::fetch_dioceses(self.conn, Some(limit))?;
        if dioceses.is_empty() {
            return Ok(Vec::new());
        }
        info!("Processing {} dioceses", dioceses.len());

        let mut outcomes = Vec::with_capacity(dioceses.len());
        for (i, diocese) in dioceses.iter().enumerate() {
            info!("{}/{}: {}", i + 1, dioceses.len(), diocese.name);
            outcomes.push(self.process_diocese(diocese).await);

            if i + 1 < dioceses.len() {
                tokio::time::sleep(Duration::from_secs_f64(self.cfg.request_delay_secs)).await;
            }
        }
        Ok(outcomes)
    }

    /// Run one diocese end to end: discover the directory, fetch it, extract,
    /// persist. Never returns an error.
    pub async fn process_diocese(&self, diocese: &Diocese) -> DioceseOutcome {
        let start = Instant::now();
        let mut outcome = match self.try_process(diocese).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("{}: {}", diocese.name, e);
                DioceseOutcome::failed(diocese, None, format!("Pipeline error: {}", e))
            }
        };
        outcome.processing_secs = start.elapsed().as_secs_f64();
        outcome
    }

    async fn try_process(&self, diocese: &Diocese) -> Result<DioceseOutcome> {
        let Some((directory_url, method)) = self.find_directory(diocese).await? else {
            db::update_directory_status(self.conn, &diocese.url, None, false, "ai_analysis")?;
            return Ok(DioceseOutcome::failed(
                diocese,
                None,
                "No parish directory found".to_string(),
            ));
        };
        info!("{}: directory {} (via {})", diocese.name, directory_url, method);

        let page = fetch::load_page(&self.spider, &directory_url).await?;
        db::save_page(
            self.conn,
            &db::PageRow {
                diocese_url: diocese.url.clone(),
                url: directory_url.clone(),
                html: page.html.clone(),
                status: page.status,
                error: page.error.clone(),
                latency_ms: Some(page.latency_ms),
            },
        )?;
        let html = page.html()?;

        let doc = Html::parse_document(html);
        let result = extract::run_extraction(&doc, &directory_url);
        info!(
            "{}: {} -> {} parishes",
            diocese.name,
            result.site_type.as_str(),
            result.parishes.len()
        );

        let saved_count = if result.success {
            let saved =
                db::save_parishes(self.conn, &result.parishes, &diocese.url, &directory_url)?;
            db::update_directory_status(
                self.conn,
                &diocese.url,
                Some(&directory_url),
                true,
                method,
            )?;
            saved
        } else {
            db::update_directory_status(
                self.conn,
                &diocese.url,
                Some(&directory_url),
                false,
                "extraction_failed",
            )?;
            0
        };

        Ok(DioceseOutcome {
            diocese_name: diocese.name.clone(),
            diocese_url: diocese.url.clone(),
            directory_url: Some(directory_url),
            site_type: result.site_type,
            success: result.success,
            parish_count: result.parishes.len(),
            saved_count,
            processing_secs: 0.0,
            errors: result.errors,
            parishes: result.parishes,
        })
    }

    /// Locate the parish directory for a diocese: anchor candidates from the
    /// homepage, falling back to the sitemap, then scored by the oracle.
    async fn find_directory(&self, diocese: &Diocese) -> Result<Option<(String, &'static str)>> {
        let home = fetch::load_page(&self.spider, &diocese.url).await?;

        let mut method = "ai_analysis";
        let mut candidates = match home.html.as_deref() {
            Some(html) => directory_candidates(&Html::parse_document(html), &diocese.url),
            None => Vec::new(),
        };

        if candidates.is_empty() {
            method = "sitemap";
            candidates = match sitemap::directory_candidates(&self.http, &diocese.url).await {
                Ok(urls) => urls
                    .into_iter()
                    .map(|url| Candidate {
                        text: url.clone(),
                        url,
                    })
                    .collect(),
                Err(e) => {
                    warn!("Sitemap fallback failed for {}: {}", diocese.url, e);
                    Vec::new()
                }
            };
        }
        if candidates.is_empty() {
            return Ok(None);
        }

        debug!("Evaluating {} candidate links", candidates.len());
        Ok(self
            .evaluate_candidates(&candidates)
            .await
            .map(|url| (url, method)))
    }

    /// Score up to five candidates with the oracle; the best one at or above
    /// the acceptance threshold wins. Scoring failures skip that candidate.
    async fn evaluate_candidates(&self, candidates: &[Candidate]) -> Option<String> {
        let mut best: Option<(u8, &Candidate)> = None;
        for candidate in candidates.iter().take(MAX_SCORED_CANDIDATES) {
            let link_info = format!("Text: '{}' URL: {}", candidate.text, candidate.url);
            match self.oracle.score_directory_candidate(&link_info).await {
                Ok(score) => {
                    debug!("'{}' -> score {}", candidate.text, score);
                    if score >= self.cfg.ai_score_threshold
                        && best.map_or(true, |(top, _)| score > top)
                    {
                        best = Some((score, candidate));
                    }
                }
                Err(e) => warn!("Candidate scoring failed: {}", e),
            }
        }
        best.map(|(_, candidate)| candidate.url.clone())
    }
}

/// Scan a page for links whose text suggests a parish directory.
pub fn directory_candidates(doc: &Html, base_url: &str) -> Vec<Candidate> {
    doc.select(&ANCHOR_SEL)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            let text = clean_text(&element_text(a));
            if href.is_empty()
                || href.starts_with('#')
                || href.starts_with("mailto:")
                || text.len() < 3
            {
                return None;
            }
            let lower = text.to_lowercase();
            if !DIRECTORY_KEYWORDS.iter().any(|k| lower.contains(k)) {
                return None;
            }
            Some(Candidate {
                url: absolutize(base_url, href),
                text,
            })
        })
        .collect()
}

fn absolutize(base: &str, href: &str) -> String {
    let base = base.trim_end_matches('/');
    if href.starts_with('/') {
        format!("{}{}", base, href)
    } else if !href.starts_with("http") {
        format!("{}/{}", base, href)
    } else {
        href.to_string()
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_filtered_and_absolutized() {
        let html = r##"
            <nav>
                <a href="/parishes">Parish Directory</a>
                <a href="mass-times">Mass Times</a>
                <a href="https://other.org/find">Find a Church</a>
                <a href="#top">Parishes</a>
                <a href="mailto:info@diocese.org">Contact a parish</a>
                <a href="/events">Events</a>
                <a href="/short">pd</a>
            </nav>
        "##;
        let doc = Html::parse_document(html);
        let candidates = directory_candidates(&doc, "https://diocese.org/");

        assert_eq!(
            candidates,
            vec![
                Candidate {
                    url: "https://diocese.org/parishes".into(),
                    text: "Parish Directory".into(),
                },
                Candidate {
                    url: "https://diocese.org/mass-times".into(),
                    text: "Mass Times".into(),
                },
                Candidate {
                    url: "https://other.org/find".into(),
                    text: "Find a Church".into(),
                },
            ]
        );
    }

    #[test]
    fn absolutize_variants() {
        assert_eq!(
            absolutize("https://diocese.org/", "/parishes"),
            "https://diocese.org/parishes"
        );
        assert_eq!(
            absolutize("https://diocese.org", "parishes"),
            "https://diocese.org/parishes"
        );
        assert_eq!(
            absolutize("https://diocese.org", "https://other.org/x"),
            "https://other.org/x"
        );
    }
}
