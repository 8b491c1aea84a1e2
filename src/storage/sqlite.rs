//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.
//! A single connection sits behind a mutex, so every operation is one
//! serialized writer and multi-statement operations run in a transaction.

use crate::crawler::FrontierEntry;
use crate::state::PageStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{ImageRecord, PageRecord, RunRecord, RunStatus, StoreStats};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        url: row.get(0)?,
        status: row.get(1)?,
        depth: row.get(2)?,
        parent: row.get(3)?,
        visited: row.get::<_, i64>(4)? != 0,
        content_hash: row.get(5)?,
        is_duplicate: row.get::<_, i64>(6)? != 0,
        duplicate_of: row.get(7)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
    })
}

fn count(conn: &Connection, sql: &str) -> StorageResult<u64> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(n as u64)
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn()
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn finish_run(&self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn().execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn reset_crawl_state(&self) -> StorageResult<()> {
        self.conn().execute_batch(
            "
            BEGIN;
            DELETE FROM pages;
            DELETE FROM frontier;
            DELETE FROM images;
            DELETE FROM content_map;
            COMMIT;
        ",
        )?;
        Ok(())
    }

    // ===== Page Management =====

    fn add_page(&self, url: &str, depth: u32, parent: &str) -> StorageResult<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO pages (url, depth, parent) VALUES (?1, ?2, ?3)",
            params![url, depth, parent],
        )?;
        Ok(())
    }

    fn mark_visited(&self, url: &str, status: PageStatus) -> StorageResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE pages SET visited = 1, status = ?1 WHERE url = ?2",
            params![status.to_db_string(), url],
        )?;
        tx.execute("DELETE FROM frontier WHERE url = ?1", params![url])?;
        tx.commit()?;
        Ok(())
    }

    fn get_page(&self, url: &str) -> StorageResult<Option<PageRecord>> {
        let page = self
            .conn()
            .query_row(
                "SELECT url, status, depth, parent, visited, content_hash, is_duplicate, duplicate_of
                 FROM pages WHERE url = ?1",
                params![url],
                page_from_row,
            )
            .optional()?;
        Ok(page)
    }

    // ===== Frontier Management =====

    fn add_frontier(&self, entry: &FrontierEntry) -> StorageResult<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO frontier (url, depth, parent)
             SELECT ?1, ?2, ?3
             WHERE NOT EXISTS (SELECT 1 FROM pages WHERE url = ?1 AND visited = 1)",
            params![entry.url, entry.depth, entry.parent],
        )?;
        Ok(())
    }

    fn pop_frontier_batch(&self, limit: usize) -> StorageResult<Vec<FrontierEntry>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let entries = {
            let mut stmt =
                tx.prepare("SELECT url, depth, parent FROM frontier ORDER BY rowid LIMIT ?1")?;
            let rows = stmt.query_map(params![limit as i64], |row| {
                Ok(FrontierEntry {
                    url: row.get(0)?,
                    depth: row.get(1)?,
                    parent: row.get(2)?,
                })
            })?;
            let entries = rows.collect::<Result<Vec<_>, _>>()?;
            entries
        };

        {
            let mut delete = tx.prepare("DELETE FROM frontier WHERE url = ?1")?;
            for entry in &entries {
                delete.execute(params![entry.url])?;
            }
        }

        tx.commit()?;
        Ok(entries)
    }

    fn frontier_len(&self) -> StorageResult<u64> {
        count(&self.conn(), "SELECT COUNT(*) FROM frontier")
    }

    // ===== Content Fingerprints =====

    fn has_content_hash(&self, content_hash: &str) -> StorageResult<bool> {
        let found = self
            .conn()
            .query_row(
                "SELECT 1 FROM content_map WHERE content_hash = ?1 LIMIT 1",
                params![content_hash],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn get_canonical_url_for_hash(&self, content_hash: &str) -> StorageResult<Option<String>> {
        let url = self
            .conn()
            .query_row(
                "SELECT canonical_url FROM content_map WHERE content_hash = ?1",
                params![content_hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(url)
    }

    fn register_content_hash(&self, content_hash: &str, url: &str) -> StorageResult<String> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        // First writer wins; later registrations only read the winner back
        tx.execute(
            "INSERT OR IGNORE INTO content_map (content_hash, canonical_url) VALUES (?1, ?2)",
            params![content_hash, url],
        )?;
        let canonical: String = tx.query_row(
            "SELECT canonical_url FROM content_map WHERE content_hash = ?1",
            params![content_hash],
            |row| row.get(0),
        )?;
        if canonical == url {
            tx.execute(
                "UPDATE pages SET content_hash = ?1 WHERE url = ?2",
                params![content_hash, url],
            )?;
        }

        tx.commit()?;
        Ok(canonical)
    }

    fn mark_page_duplicate(
        &self,
        url: &str,
        content_hash: &str,
        canonical_url: &str,
    ) -> StorageResult<()> {
        self.conn().execute(
            "UPDATE pages SET content_hash = ?1, is_duplicate = 1, duplicate_of = ?2 WHERE url = ?3",
            params![content_hash, canonical_url, url],
        )?;
        Ok(())
    }

    // ===== Images =====

    fn add_image_manifest(&self, record: &ImageRecord) -> StorageResult<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO images (image_file, image_url, page_url, size_bytes)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.image_file,
                record.image_url,
                record.page_url,
                record.size_bytes as i64
            ],
        )?;
        Ok(())
    }

    fn get_image(&self, image_url: &str) -> StorageResult<Option<ImageRecord>> {
        let image = self
            .conn()
            .query_row(
                "SELECT image_file, image_url, page_url, size_bytes FROM images WHERE image_url = ?1",
                params![image_url],
                |row| {
                    Ok(ImageRecord {
                        image_file: row.get(0)?,
                        image_url: row.get(1)?,
                        page_url: row.get(2)?,
                        size_bytes: row.get::<_, i64>(3)?.max(0) as u64,
                    })
                },
            )
            .optional()?;
        Ok(image)
    }

    // ===== Statistics =====

    fn stats(&self) -> StorageResult<StoreStats> {
        let conn = self.conn();
        Ok(StoreStats {
            pages: count(&conn, "SELECT COUNT(*) FROM pages")?,
            visited: count(&conn, "SELECT COUNT(*) FROM pages WHERE visited = 1")?,
            duplicates: count(&conn, "SELECT COUNT(*) FROM pages WHERE is_duplicate = 1")?,
            frontier: count(&conn, "SELECT COUNT(*) FROM frontier")?,
            images: count(&conn, "SELECT COUNT(*) FROM images")?,
            fingerprints: count(&conn, "SELECT COUNT(*) FROM content_map")?,
        })
    }
}
