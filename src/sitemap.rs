use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::info;

static DIRECTORY_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(parish|church|directory|finder|location|worship|mass)").unwrap()
});

/// Fetch `<base>/sitemap.xml` and return the URLs that look like parish
/// directory pages. Fallback discovery path for homepages with no usable
/// navigation links.
pub async fn directory_candidates(
    http: &reqwest::Client,
    base_url: &str,
) -> Result<Vec<String>> {
    let sitemap_url = format!("{}/sitemap.xml", base_url.trim_end_matches('/'));
    info!("Fetching sitemap: {}", sitemap_url);

    let xml = http
        .get(&sitemap_url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
        .context("Failed to fetch sitemap")?;

    let all_urls = parse_urlset(&xml)?;
    let filtered: Vec<String> = all_urls
        .into_iter()
        .filter(|url| DIRECTORY_URL_RE.is_match(url))
        .collect();
    info!("Sitemap URLs matching directory keywords: {}", filtered.len());
    Ok(filtered)
}

/// Parse a urlset XML and return all <loc> URLs.
fn parse_urlset(xml: &str) -> Result<Vec<String>> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut urls = Vec::new();
    let mut in_url = false;
    let mut in_loc = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.name().as_ref() {
                b"url" => in_url = true,
                b"loc" if in_url => in_loc = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(e)) if in_loc => {
                urls.push(e.unescape()?.to_string());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.name().as_ref() {
                b"loc" => in_loc = false,
                b"url" => in_url = false,
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(urls)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const URLSET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
            <url><loc>https://diocese.org/</loc></url>
            <url><loc>https://diocese.org/parish-directory</loc></url>
            <url><loc>https://diocese.org/news/2024</loc></url>
            <url><loc>https://diocese.org/find-a-church</loc></url>
        </urlset>"#;

    #[test]
    fn urlset_locs_parsed() {
        let urls = parse_urlset(URLSET).unwrap();
        assert_eq!(urls.len(), 4);
        assert_eq!(urls[0], "https://diocese.org/");
    }

    #[test]
    fn directory_keyword_filter() {
        let urls = parse_urlset(URLSET).unwrap();
        let filtered: Vec<_> = urls
            .into_iter()
            .filter(|u| DIRECTORY_URL_RE.is_match(u))
            .collect();
        assert_eq!(
            filtered,
            vec![
                "https://diocese.org/parish-directory".to_string(),
                "https://diocese.org/find-a-church".to_string(),
            ]
        );
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse_urlset("<urlset><url><loc>x</url>").is_err());
    }
}
