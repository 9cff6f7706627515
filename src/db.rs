use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;

use crate::extract::Parish;

const DB_PATH: &str = "data/parishes.sqlite";

pub fn connect() -> Result<Connection> {
    if let Some(dir) = std::path::Path::new(DB_PATH).parent() {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(DB_PATH)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS dioceses (
            id         INTEGER PRIMARY KEY,
            name       TEXT NOT NULL,
            url        TEXT UNIQUE NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS pages (
            id          INTEGER PRIMARY KEY,
            diocese_url TEXT NOT NULL,
            url         TEXT UNIQUE NOT NULL,
            html        TEXT,
            status      INTEGER,
            error       TEXT,
            latency_ms  INTEGER,
            fetched_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_pages_diocese ON pages(diocese_url);

        -- Column names match the upstream Parishes sink schema.
        CREATE TABLE IF NOT EXISTS parishes (
            id                   INTEGER PRIMARY KEY,
            "Name"               TEXT NOT NULL,
            "City"               TEXT,
            "Street Address"     TEXT,
            "Phone Number"       TEXT,
            "Web"                TEXT,
            latitude             REAL,
            longitude            REAL,
            confidence_score     REAL NOT NULL,
            extraction_method    TEXT NOT NULL,
            extracted_at         TEXT NOT NULL,
            diocese_url          TEXT NOT NULL,
            parish_directory_url TEXT NOT NULL,
            UNIQUE(parish_directory_url, "Name")
        );
        CREATE INDEX IF NOT EXISTS idx_parishes_diocese ON parishes(diocese_url);

        CREATE TABLE IF NOT EXISTS directory_status (
            diocese_url          TEXT PRIMARY KEY,
            parish_directory_url TEXT,
            found                TEXT NOT NULL,
            found_method         TEXT NOT NULL,
            updated_at           TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

// ── Dioceses ──

#[derive(Debug, Clone)]
pub struct Diocese {
    pub name: String,
    pub url: String,
}

pub fn insert_dioceses(conn: &Connection, dioceses: &[Diocese]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare("INSERT OR IGNORE INTO dioceses (name, url) VALUES (?1, ?2)")?;
        for diocese in dioceses {
            count += stmt.execute(rusqlite::params![diocese.name, diocese.url])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn fetch_dioceses(conn: &Connection, limit: Option<usize>) -> Result<Vec<Diocese>> {
    let sql = match limit {
        Some(n) => format!("SELECT name, url FROM dioceses ORDER BY id LIMIT {}", n),
        None => "SELECT name, url FROM dioceses ORDER BY id".to_string(),
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Diocese {
                name: row.get(0)?,
                url: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Page snapshots ──

pub struct PageRow {
    pub diocese_url: String,
    pub url: String,
    pub html: Option<String>,
    pub status: Option<i32>,
    pub error: Option<String>,
    pub latency_ms: Option<i64>,
}

pub fn save_page(conn: &Connection, row: &PageRow) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO pages (diocese_url, url, html, status, error, latency_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            row.diocese_url,
            row.url,
            row.html,
            row.status,
            row.error,
            row.latency_ms,
        ],
    )?;
    Ok(())
}

pub struct StoredPage {
    pub diocese_url: String,
    pub url: String,
    pub html: String,
}

pub fn fetch_pages(conn: &Connection, limit: Option<usize>) -> Result<Vec<StoredPage>> {
    let sql = format!(
        "SELECT diocese_url, url, html FROM pages WHERE html IS NOT NULL ORDER BY id{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(StoredPage {
                diocese_url: row.get(0)?,
                url: row.get(1)?,
                html: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Parishes ──

/// Persist a batch of extracted parishes. Rows that collide on
/// (directory, name) are ignored rather than rejected; the return value is
/// the number actually written.
pub fn save_parishes(
    conn: &Connection,
    parishes: &[Parish],
    diocese_url: &str,
    directory_url: &str,
) -> Result<usize> {
    let extracted_at = Utc::now().to_rfc3339();
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            r#"INSERT OR IGNORE INTO parishes
               ("Name", "City", "Street Address", "Phone Number", "Web",
                latitude, longitude, confidence_score, extraction_method,
                extracted_at, diocese_url, parish_directory_url)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"#,
        )?;
        for parish in parishes {
            count += stmt.execute(rusqlite::params![
                parish.name,
                parish.city,
                parish.address,
                parish.phone,
                parish.website,
                parish.latitude,
                parish.longitude,
                parish.confidence,
                parish.extraction_method,
                extracted_at,
                diocese_url,
                directory_url,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

// ── Directory status ──

/// Record where (or whether) a diocese's parish directory was found.
/// Idempotent by diocese URL: one row per diocese, latest write wins.
pub fn update_directory_status(
    conn: &Connection,
    diocese_url: &str,
    directory_url: Option<&str>,
    success: bool,
    method: &str,
) -> Result<()> {
    let found = if success && directory_url.is_some() {
        "Success"
    } else {
        "Not Found"
    };
    conn.execute(
        "INSERT OR REPLACE INTO directory_status
         (diocese_url, parish_directory_url, found, found_method, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            diocese_url,
            directory_url,
            found,
            method,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

// ── Stats ──

pub struct Stats {
    pub dioceses: usize,
    pub pages: usize,
    pub page_errors: usize,
    pub directories_found: usize,
    pub parishes: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let dioceses: usize = conn.query_row("SELECT COUNT(*) FROM dioceses", [], |r| r.get(0))?;
    let pages: usize = conn.query_row("SELECT COUNT(*) FROM pages", [], |r| r.get(0))?;
    let page_errors: usize = conn.query_row(
        "SELECT COUNT(*) FROM pages WHERE error IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let directories_found: usize = conn.query_row(
        "SELECT COUNT(*) FROM directory_status WHERE found = 'Success'",
        [],
        |r| r.get(0),
    )?;
    let parishes: usize = conn.query_row("SELECT COUNT(*) FROM parishes", [], |r| r.get(0))?;
    Ok(Stats {
        dioceses,
        pages,
        page_errors,
        directories_found,
        parishes,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn parish(name: &str) -> Parish {
        Parish {
            name: name.to_string(),
            city: Some("Cleveland".into()),
            address: None,
            phone: None,
            website: None,
            latitude: None,
            longitude: None,
            confidence: 0.9,
            extraction_method: "parish_finder",
        }
    }

    #[test]
    fn diocese_insert_is_idempotent() {
        let conn = memory_db();
        let dioceses = vec![Diocese {
            name: "Diocese of Cleveland".into(),
            url: "https://dioceseofcleveland.org".into(),
        }];
        assert_eq!(insert_dioceses(&conn, &dioceses).unwrap(), 1);
        assert_eq!(insert_dioceses(&conn, &dioceses).unwrap(), 0);
        assert_eq!(fetch_dioceses(&conn, None).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_parishes_saved_once() {
        let conn = memory_db();
        let batch = vec![parish("St. Mary Parish"), parish("Holy Trinity Church")];
        let saved = save_parishes(
            &conn,
            &batch,
            "https://dioceseofcleveland.org",
            "https://dioceseofcleveland.org/parishes",
        )
        .unwrap();
        assert_eq!(saved, 2);

        // Re-saving the same batch for the same directory writes nothing new.
        let saved = save_parishes(
            &conn,
            &batch,
            "https://dioceseofcleveland.org",
            "https://dioceseofcleveland.org/parishes",
        )
        .unwrap();
        assert_eq!(saved, 0);
        assert_eq!(get_stats(&conn).unwrap().parishes, 2);
    }

    #[test]
    fn directory_status_upsert_is_idempotent() {
        let conn = memory_db();
        let url = "https://dioceseofcleveland.org";
        update_directory_status(&conn, url, None, false, "ai_analysis").unwrap();
        update_directory_status(&conn, url, Some("https://x.org/parishes"), true, "sitemap")
            .unwrap();

        let (rows, found, method): (usize, String, String) = conn
            .query_row(
                "SELECT COUNT(*), found, found_method FROM directory_status WHERE diocese_url = ?1",
                [url],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(found, "Success");
        assert_eq!(method, "sitemap");
    }

    #[test]
    fn page_snapshots_round_trip() {
        let conn = memory_db();
        save_page(
            &conn,
            &PageRow {
                diocese_url: "https://dioceseofcleveland.org".into(),
                url: "https://dioceseofcleveland.org/parishes".into(),
                html: Some("<html></html>".into()),
                status: Some(200),
                error: None,
                latency_ms: Some(120),
            },
        )
        .unwrap();
        save_page(
            &conn,
            &PageRow {
                diocese_url: "https://archden.org".into(),
                url: "https://archden.org/parishes".into(),
                html: None,
                status: None,
                error: Some("timeout".into()),
                latency_ms: Some(30000),
            },
        )
        .unwrap();

        // Only snapshots with content are eligible for reprocessing.
        let pages = fetch_pages(&conn, None).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].url, "https://dioceseofcleveland.org/parishes");

        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.pages, 2);
        assert_eq!(stats.page_errors, 1);
    }
}
