use anyhow::Result;
use sqlx::SqlitePool;

pub const SCHEMA_VERSION: &str = "1";

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Collection-level settings (schema version, embedding dims)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collection_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One row per stored chunk; seq preserves insertion order
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            chunk_id TEXT NOT NULL UNIQUE,
            source_id TEXT NOT NULL,
            start_offset INTEGER NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL,
            dims INTEGER NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_source_id ON records(source_id)")
        .execute(pool)
        .await?;

    sqlx::query("INSERT OR IGNORE INTO collection_meta (key, value) VALUES ('schema_version', ?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}
