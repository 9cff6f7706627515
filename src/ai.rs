use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{anyhow, Result};
use regex::Regex;
use serde_json::{json, Value};
use tracing::warn;

const MODEL: &str = "gemini-1.5-flash";
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;

/// Score returned for every directory-candidate query when no API key is
/// configured, so the rest of the pipeline stays exercisable without one.
pub const MOCK_DIRECTORY_SCORE: u8 = 7;

static SCORE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Language-model scoring oracle. Treated as a synchronous collaborator that
/// either answers or fails terminally after its own bounded retries.
pub struct Oracle {
    http: reqwest::Client,
    api_key: Option<String>,
}

impl Oracle {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }

    pub fn enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Rate 0-10 how likely a link leads to a parish directory.
    pub async fn score_directory_candidate(&self, link_info: &str) -> Result<u8> {
        let Some(key) = self.api_key.clone() else {
            return Ok(MOCK_DIRECTORY_SCORE);
        };

        let prompt = format!(
            "Rate 0-10 how likely this link leads to a parish directory, church finder, \
             or list of parishes.\n\
             Look for keywords like: parish, church, directory, finder, locations, \
             worship sites, mass times.\n\n\
             Link information: {}\n\n\
             Respond with ONLY a number from 0-10.",
            truncate(link_info, 500)
        );

        let text = self.generate(&key, &prompt).await?;
        let score = SCORE_RE
            .find(&text)
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .unwrap_or(0);
        Ok(score.clamp(0, 10) as u8)
    }

    /// Extract a structured parish field map from a text snippet. Returns a
    /// fixed sample map when no API key is configured.
    pub async fn extract_parish_fields(&self, text: &str) -> Result<Value> {
        let Some(key) = self.api_key.clone() else {
            return Ok(json!({ "name": "Sample Parish", "city": "Sample City" }));
        };

        let prompt = format!(
            "Extract parish information from this text. Look for parish name, city, \
             address, phone number, website.\n\n\
             Text: {}\n\n\
             Return as valid JSON with fields: name, city, address, phone, website",
            truncate(text, 1000)
        );

        let raw = self.generate(&key, &prompt).await?;
        Ok(parse_json_object(&raw))
    }

    async fn generate(&self, key: &str, prompt: &str) -> Result<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            MODEL, key
        );
        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });

        let mut last_err = anyhow!("model call never attempted");
        for attempt in 0..MAX_RETRIES {
            match self.try_generate(&url, &body).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                    warn!(
                        "Model call failed (attempt {}/{}): {}; backing off {:.1}s",
                        attempt + 1,
                        MAX_RETRIES,
                        e,
                        backoff.as_secs_f64()
                    );
                    last_err = e;
                    tokio::time::sleep(backoff).await;
                }
            }
        }
        Err(last_err)
    }

    async fn try_generate(&self, url: &str, body: &Value) -> Result<String> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        let value: Value = response.json().await?;
        value
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("No text in model response"))
    }
}

/// Pull the first `{...}` object out of a model reply, tolerating code fences
/// and surrounding prose. An unparseable reply degrades to an empty map.
fn parse_json_object(raw: &str) -> Value {
    let candidate = match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => return json!({}),
    };
    serde_json::from_str(candidate).unwrap_or_else(|_| json!({}))
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ── Tests ──
