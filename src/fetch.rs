use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use tracing::warn;

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;

/// One rendered page snapshot, successful or not.
pub struct FetchedPage {
    pub url: String,
    pub html: Option<String>,
    pub status: Option<i32>,
    pub error: Option<String>,
    pub latency_ms: i64,
}

impl FetchedPage {
    pub fn html(&self) -> Result<&str> {
        self.html.as_deref().ok_or_else(|| {
            anyhow!(
                "Page load failed for {}: {}",
                self.url,
                self.error.as_deref().unwrap_or("no content")
            )
        })
    }
}

pub fn client(api_key: Option<&str>) -> Result<Spider> {
    let key = api_key.ok_or_else(|| anyhow!("SPIDER_API_KEY environment variable must be set"))?;
    Spider::new(Some(key.to_string()))
        .map_err(|e| anyhow!("Failed to create Spider client: {}", e))
}

/// Load one page as rendered HTML, retrying rate limits and upstream 5xx
/// with exponential backoff. A terminal failure still yields a `FetchedPage`
/// (with `html: None`) so the caller can record it.
pub async fn load_page(spider: &Spider, url: &str) -> Result<FetchedPage> {
    for attempt in 0..=MAX_RETRIES {
        let page = fetch_once(spider, url).await?;

        let should_retry = match &page.error {
            Some(e) if e.contains("429") || e.contains("rate") => true,
            Some(e) if e.contains("500") || e.contains("502") || e.contains("503") => true,
            _ => false,
        };

        if !should_retry || attempt == MAX_RETRIES {
            return Ok(page);
        }

        let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
        warn!(
            "Transient failure on {} (attempt {}/{}), backing off {:.1}s",
            url,
            attempt + 1,
            MAX_RETRIES,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
    }

    fetch_once(spider, url).await
}

async fn fetch_once(spider: &Spider, url: &str) -> Result<FetchedPage> {
    let params = RequestParams {
        return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Raw)),
        ..Default::default()
    };

    let start = Instant::now();
    let response = spider
        .scrape_url(url, Some(params), "application/json")
        .await;
    let latency_ms = start.elapsed().as_millis() as i64;

    match response {
        Ok(value) => {
            let parsed: serde_json::Value = match value.as_str() {
                Some(s) => serde_json::from_str(s).unwrap_or(value.clone()),
                None => value,
            };

            let first = parsed.as_array().and_then(|arr| arr.first());

            let html = first
                .and_then(|obj| obj.get("content"))
                .and_then(|c| c.as_str())
                .map(str::to_string);

            let status = first
                .and_then(|obj| obj.get("status"))
                .and_then(|s| s.as_i64())
                .map(|s| s as i32);

            Ok(FetchedPage {
                url: url.to_string(),
                html,
                status,
                error: None,
                latency_ms,
            })
        }
        Err(e) => Ok(FetchedPage {
            url: url.to_string(),
            html: None,
            status: None,
            error: Some(e.to_string()),
            latency_ms,
        }),
    }
}
