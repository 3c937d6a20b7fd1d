//! Persistent translation cache backed by SQLite.
//! Natural key: (source_text, source_lang, target_lang). Writes are upserts,
//! so a fresh translation always replaces the previous row for that key.

use std::collections::BTreeMap;
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

const SECS_PER_DAY: i64 = 86_400;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("cache directory error: {0}")]
    Io(#[from] std::io::Error),
}

/// A cached translation row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    pub source_text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub translated_text: String,
    pub provider_used: String,
    /// Unix seconds.
    pub created_at: i64,
}

/// Read-only aggregate over the cache contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_entries: u64,
    pub counts_by_provider: BTreeMap<String, u64>,
}

/// SQLite-backed translation cache. The connection lock serializes every
/// read and write, so overlapping callers cannot interleave statements.
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Open (or create) the cache database at the given path.
    pub fn open(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init(conn).map(|cache| {
            info!(path = %db_path.display(), "translation cache opened");
            cache
        })
    }

    /// Non-durable cache, mostly for tests and cache-less embedding.
    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS translation_cache (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_text TEXT NOT NULL,
                source_lang TEXT NOT NULL,
                target_lang TEXT NOT NULL,
                translated_text TEXT NOT NULL,
                provider_used TEXT,
                created_at INTEGER NOT NULL,
                UNIQUE(source_text, source_lang, target_lang)
            );
            CREATE INDEX IF NOT EXISTS idx_translation_cache_created
                ON translation_cache(created_at);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Look up the entry for a key. `Ok(None)` on a miss.
    pub fn lookup(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let conn = self.conn.lock();
        let entry = conn
            .query_row(
                "SELECT translated_text, provider_used, created_at
                 FROM translation_cache
                 WHERE source_text = ?1 AND source_lang = ?2 AND target_lang = ?3",
                params![text, source_lang, target_lang],
                |row| {
                    Ok(CacheEntry {
                        source_text: text.to_string(),
                        source_lang: source_lang.to_string(),
                        target_lang: target_lang.to_string(),
                        translated_text: row.get(0)?,
                        provider_used: row
                            .get::<_, Option<String>>(1)?
                            .unwrap_or_default(),
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?;

        if entry.is_some() {
            debug!(source_lang, target_lang, "cache hit");
        }
        Ok(entry)
    }

    /// Insert or overwrite the entry for a key, stamped with the current time.
    pub fn upsert(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        translated_text: &str,
        provider_id: &str,
    ) -> Result<(), CacheError> {
        self.upsert_at(
            text,
            source_lang,
            target_lang,
            translated_text,
            provider_id,
            now_unix(),
        )
    }

    pub(crate) fn upsert_at(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        translated_text: &str,
        provider_id: &str,
        created_at: i64,
    ) -> Result<(), CacheError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO translation_cache
             (source_text, source_lang, target_lang, translated_text, provider_used, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(source_text, source_lang, target_lang) DO UPDATE SET
                translated_text = excluded.translated_text,
                provider_used = excluded.provider_used,
                created_at = excluded.created_at",
            params![text, source_lang, target_lang, translated_text, provider_id, created_at],
        )?;
        Ok(())
    }

    /// Delete entries created more than `days` days ago. Returns the number removed.
    pub fn purge_older_than(&self, days: u32) -> Result<usize, CacheError> {
        let cutoff = now_unix() - i64::from(days) * SECS_PER_DAY;
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM translation_cache WHERE created_at < ?1",
            params![cutoff],
        )?;
        if removed > 0 {
            info!(removed, days, "translation cache purge");
        }
        Ok(removed)
    }

    /// Total entries and per-provider counts.
    pub fn aggregate_stats(&self) -> Result<CacheStats, CacheError> {
        let conn = self.conn.lock();
        let total: i64 =
            conn.query_row("SELECT COUNT(*) FROM translation_cache", [], |row| row.get(0))?;

        let mut stmt = conn.prepare(
            "SELECT provider_used, COUNT(*) FROM translation_cache GROUP BY provider_used",
        )?;
        let mut counts_by_provider = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, Option<String>>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (provider, count) = row?;
            counts_by_provider.insert(provider.unwrap_or_default(), count as u64);
        }

        Ok(CacheStats {
            total_entries: total as u64,
            counts_by_provider,
        })
    }

    /// Simulate a broken store: every later statement fails.
    #[cfg(test)]
    pub(crate) fn drop_table_for_tests(&self) {
        self.conn
            .lock()
            .execute_batch("DROP TABLE translation_cache")
            .unwrap();
    }
}

/// Current time as Unix timestamp (seconds).
fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
