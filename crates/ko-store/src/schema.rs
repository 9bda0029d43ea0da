use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    // Checkpoint roughly every 400KB of WAL instead of the 4MB default.
    conn.pragma_update(None, "wal_autocheckpoint", 100)?;

    // Fold any leftover WAL data into the main file on open. In-memory
    // and brand-new databases legitimately fail this, so ignore errors.
    if conn
        .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
        .is_ok()
    {
        tracing::debug!("checkpointed WAL on open");
    }

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS kos (
            id           TEXT PRIMARY KEY,
            title        TEXT NOT NULL,
            content      TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            ko_type      TEXT NOT NULL DEFAULT 'fragment'
                         CHECK(ko_type IN ('fragment', 'synthesis', 'observation')),
            tags         TEXT NOT NULL DEFAULT '[]',
            created_at   INTEGER NOT NULL,
            updated_at   INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS links (
            source_id  TEXT NOT NULL,
            target_id  TEXT NOT NULL,
            link_type  TEXT NOT NULL DEFAULT 'explicit'
                       CHECK(link_type IN ('explicit', 'collision', 'agent')),
            created_at INTEGER NOT NULL,
            PRIMARY KEY (source_id, target_id),
            FOREIGN KEY (source_id) REFERENCES kos(id) ON DELETE CASCADE,
            FOREIGN KEY (target_id) REFERENCES kos(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS ko_memory (
            ko_id                TEXT PRIMARY KEY,
            observation_count    INTEGER NOT NULL DEFAULT 0,
            collision_count      INTEGER NOT NULL DEFAULT 0,
            last_observed        INTEGER,
            total_observation_ms INTEGER NOT NULL DEFAULT 0,
            drift_distance       REAL NOT NULL DEFAULT 0,
            affinity             TEXT NOT NULL DEFAULT '{}',
            rivalry              TEXT NOT NULL DEFAULT '{}',
            traits               TEXT NOT NULL DEFAULT '{}',
            history              TEXT NOT NULL DEFAULT '[]',
            FOREIGN KEY (ko_id) REFERENCES kos(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS ko_physics (
            ko_id          TEXT PRIMARY KEY,
            position_x     REAL NOT NULL DEFAULT 0,
            position_y     REAL NOT NULL DEFAULT 0,
            velocity_x     REAL NOT NULL DEFAULT 0,
            velocity_y     REAL NOT NULL DEFAULT 0,
            entropy        REAL NOT NULL DEFAULT 1.0,
            mass           REAL NOT NULL DEFAULT 1.0,
            is_anchored    INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (ko_id) REFERENCES kos(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_kos_type ON kos(ko_type);
        CREATE INDEX IF NOT EXISTS idx_kos_updated ON kos(updated_at);
        CREATE INDEX IF NOT EXISTS idx_links_source ON links(source_id);
        CREATE INDEX IF NOT EXISTS idx_links_target ON links(target_id);
        CREATE INDEX IF NOT EXISTS idx_memory_last_observed ON ko_memory(last_observed);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT value FROM metadata WHERE key = 'schema_version'")?;
    let version = stmt
        .query_row([], |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<i64>().unwrap_or(0))
        })
        .ok();
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        for table in &["metadata", "kos", "links", "ko_memory", "ko_physics"] {
            let count: i64 = conn
                .query_row(&format!("SELECT count(*) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .unwrap();
            assert!(count >= 0, "table {table} should exist");
        }
    }

    #[test]
    fn test_schema_version_set() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_idempotent_initialize() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        initialize(&conn).unwrap(); // should not error
    }

    #[test]
    fn test_busy_timeout_set() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let timeout: i64 = conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(timeout, 5000, "busy_timeout should be 5000ms");
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO ko_memory (ko_id) VALUES ('missing')",
            [],
        );
        assert!(result.is_err(), "memory rows require an owning KO");
    }
}
