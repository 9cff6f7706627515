mod ai;
mod config;
mod db;
mod extract;
mod fetch;
mod pipeline;
mod sitemap;
mod text;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scraper::Html;
use serde::Deserialize;

use crate::config::Config;
use crate::pipeline::{DioceseOutcome, Pipeline};

#[derive(Parser)]
#[command(name = "parish_scraper", about = "Diocese parish directory scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load dioceses from a JSON seed file into the store
    Init {
        /// JSON array of {"name": ..., "url": ...} objects
        file: PathBuf,
    },
    /// Crawl dioceses: find directories, extract parishes, persist
    Run {
        /// Max dioceses to process (default: config limit)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Write a JSON report of per-diocese results
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Extract parishes from a single directory URL and print them
    Extract { url: String },
    /// Re-run extraction over stored page snapshots
    Process {
        /// Max snapshots to process (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show crawl statistics
    Stats,
}

#[derive(Deserialize)]
struct DioceseSeed {
    name: String,
    url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let cfg = Config::from_env();

    let result = match cli.command {
        Commands::Init { file } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let seeds: Vec<DioceseSeed> = serde_json::from_str(&raw)?;
            let dioceses: Vec<db::Diocese> = seeds
                .into_iter()
                .map(|s| db::Diocese {
                    name: s.name,
                    url: s.url,
                })
                .collect();
            let inserted = db::insert_dioceses(&conn, &dioceses)?;
            println!(
                "Inserted {} new dioceses ({} in file)",
                inserted,
                dioceses.len()
            );
            Ok(())
        }
        Commands::Run { limit, out } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let pipeline = Pipeline::new(cfg, &conn)?;
            let outcomes = pipeline.run(limit).await?;
            if outcomes.is_empty() {
                println!("No dioceses to process. Run 'init' first.");
                return Ok(());
            }
            print_summary(&outcomes);
            if let Some(path) = out {
                std::fs::write(&path, serde_json::to_string_pretty(&outcomes)?)?;
                println!("Results saved to: {}", path.display());
            }
            Ok(())
        }
        Commands::Extract { url } => {
            let spider = fetch::client(cfg.spider_api_key.as_deref())?;
            let page = fetch::load_page(&spider, &url).await?;

            let mut snippet = None;
            let outcome = match page.html() {
                Ok(html) => {
                    let doc = Html::parse_document(html);
                    snippet = Some(text::clean_text(&text::element_text(doc.root_element())));
                    extract::run_extraction(&doc, &url)
                }
                Err(e) => {
                    extract::ExtractionOutcome::failed(extract::SiteType::Generic, e.to_string())
                }
            };

            println!("Site type: {}", outcome.site_type.as_str());
            println!("Parishes:  {}", outcome.parishes.len());
            for parish in &outcome.parishes {
                println!(
                    "  {} | {} | {} | {}",
                    parish.name,
                    parish.city.as_deref().unwrap_or("-"),
                    parish.phone.as_deref().unwrap_or("-"),
                    parish.website.as_deref().unwrap_or("-"),
                );
            }
            for error in &outcome.errors {
                println!("Error: {}", error);
            }

            if outcome.parishes.is_empty() {
                if let Some(snippet) = snippet {
                    let oracle = ai::Oracle::new(cfg.gemini_api_key.clone());
                    let fields = oracle.extract_parish_fields(&snippet).await?;
                    println!("No records extracted; model field guess: {}", fields);
                }
            }
            Ok(())
        }
        Commands::Process { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let pages = db::fetch_pages(&conn, limit)?;
            if pages.is_empty() {
                println!("No stored snapshots. Run 'run' first.");
                return Ok(());
            }
            println!("Reprocessing {} snapshots...", pages.len());
            let counts = process_snapshots(&conn, &pages)?;
            println!(
                "Extracted {} parishes from {} snapshots ({} saved, {} pages with records).",
                counts.parishes, pages.len(), counts.saved, counts.successes
            );
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Dioceses:          {}", s.dioceses);
            println!("Pages fetched:     {}", s.pages);
            println!("Page errors:       {}", s.page_errors);
            println!("Directories found: {}", s.directories_found);
            println!("Parishes saved:    {}", s.parishes);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

struct ProcessCounts {
    parishes: usize,
    saved: usize,
    successes: usize,
}

/// Re-extract stored snapshots in parallel. Extraction is stateless per
/// document, so documents fan out across threads; writes stay on this one.
fn process_snapshots(
    conn: &rusqlite::Connection,
    pages: &[db::StoredPage],
) -> Result<ProcessCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec})")?
            .progress_chars("=> "),
    );

    let mut counts = ProcessCounts {
        parishes: 0,
        saved: 0,
        successes: 0,
    };

    for chunk in pages.chunks(100) {
        let outcomes: Vec<_> = chunk
            .par_iter()
            .map(|page| {
                let doc = Html::parse_document(&page.html);
                extract::run_extraction(&doc, &page.url)
            })
            .collect();

        for (page, outcome) in chunk.iter().zip(outcomes) {
            counts.parishes += outcome.parishes.len();
            if outcome.success {
                counts.successes += 1;
            }
            counts.saved +=
                db::save_parishes(conn, &outcome.parishes, &page.diocese_url, &page.url)?;
            pb.inc(1);
        }
    }

    pb.finish_and_clear();
    Ok(counts)
}

fn print_summary(outcomes: &[DioceseOutcome]) {
    let total_parishes: usize = outcomes.iter().map(|o| o.parish_count).sum();
    let total_saved: usize = outcomes.iter().map(|o| o.saved_count).sum();
    let successful = outcomes.iter().filter(|o| o.success).count();

    println!("\n{}", "=".repeat(60));
    println!("EXTRACTION SUMMARY");
    println!("{}", "=".repeat(60));
    println!("Dioceses processed:     {}", outcomes.len());
    println!("Successful extractions: {}", successful);
    println!(
        "Success rate:           {:.1}%",
        successful as f64 / outcomes.len() as f64 * 100.0
    );
    println!("Total parishes found:   {}", total_parishes);
    println!("Total parishes saved:   {}", total_saved);
    if successful > 0 {
        println!(
            "Average per diocese:    {:.1}",
            total_parishes as f64 / successful as f64
        );
    }

    println!("\nIndividual results:");
    for outcome in outcomes {
        let status = if outcome.success { "ok " } else { "ERR" };
        println!(
            "  [{}] {}: {} parishes ({})",
            status,
            outcome.diocese_name,
            outcome.parish_count,
            outcome.site_type.as_str()
        );
        for error in &outcome.errors {
            println!("        Error: {}", error);
        }
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
