const CREATE_RANK_SNAPSHOTS_SQL: &str = "CREATE TABLE IF NOT EXISTS rank_snapshots (
    participant_id TEXT PRIMARY KEY,
    last_rank INTEGER NOT NULL,
    best_rank INTEGER NOT NULL,
    last_seen_at TEXT NOT NULL
)";

pub async fn run(pool: &sqlx::SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_RANK_SNAPSHOTS_SQL).execute(pool).await?;
    Ok(())
}
