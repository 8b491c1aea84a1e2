//! Database schema definitions
//!
//! The resume store holds four crawl tables plus a run history. Frontier
//! order is the table's rowid order, which `INSERT OR IGNORE` preserves for
//! already pending URLs.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Every URL accepted into the crawl, visited or not
CREATE TABLE IF NOT EXISTS pages (
    url TEXT PRIMARY KEY,
    status TEXT NOT NULL DEFAULT '',
    depth INTEGER NOT NULL DEFAULT 0,
    parent TEXT NOT NULL DEFAULT '',
    visited INTEGER NOT NULL DEFAULT 0,
    content_hash TEXT,
    is_duplicate INTEGER NOT NULL DEFAULT 0,
    duplicate_of TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_pages_content_hash ON pages(content_hash);

-- Pending work, oldest rowid first
CREATE TABLE IF NOT EXISTS frontier (
    url TEXT PRIMARY KEY,
    depth INTEGER NOT NULL,
    parent TEXT NOT NULL DEFAULT ''
);

-- Image manifest
CREATE TABLE IF NOT EXISTS images (
    image_file TEXT NOT NULL DEFAULT '',
    image_url TEXT PRIMARY KEY,
    page_url TEXT NOT NULL,
    size_bytes INTEGER NOT NULL DEFAULT 0
);

-- One canonical URL per content fingerprint
CREATE TABLE IF NOT EXISTS content_map (
    content_hash TEXT PRIMARY KEY,
    canonical_url TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
