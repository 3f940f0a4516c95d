use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ringside_shared::{RankSnapshot, SnapshotPairs};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::Result;

#[cfg(test)]
use crate::error::LeaderboardError;
#[cfg(test)]
use std::collections::HashMap;

/// Capability handle to the persisted rank history.
///
/// The poll cycle is the only writer. `put_all` is atomic: a failed batch
/// leaves every previous snapshot intact.
#[async_trait]
pub trait RankStore: Send + Sync {
    async fn get(&self, participant_id: &str) -> Result<Option<RankSnapshot>>;

    /// Every persisted snapshot as `(participant_id, snapshot)` pairs,
    /// ordered by participant id.
    async fn list(&self) -> Result<SnapshotPairs>;

    /// Upsert one poll's observations in a single transaction, stamping each
    /// row with `seen_at`.
    async fn put_all(&self, observations: &SnapshotPairs, seen_at: DateTime<Utc>) -> Result<()>;

    /// Delete snapshots last seen strictly before `cutoff`. Returns the
    /// number of rows removed.
    async fn prune(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

const SNAPSHOT_WRITE_CHUNK: usize = 500;

pub struct SqliteRankStore {
    pool: SqlitePool,
}

impl SqliteRankStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn rank_from_row(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[async_trait]
impl RankStore for SqliteRankStore {
    async fn get(&self, participant_id: &str) -> Result<Option<RankSnapshot>> {
        let row = sqlx::query_as::<_, (i64, i64)>(
            "SELECT last_rank, best_rank FROM rank_snapshots WHERE participant_id = ?",
        )
        .bind(participant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(last_rank, best_rank)| RankSnapshot {
            last_rank: rank_from_row(last_rank),
            best_rank: rank_from_row(best_rank),
        }))
    }

    async fn list(&self) -> Result<SnapshotPairs> {
        let rows = sqlx::query_as::<_, (String, i64, i64)>(
            "SELECT participant_id, last_rank, best_rank FROM rank_snapshots \
             ORDER BY participant_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(participant_id, last_rank, best_rank)| {
                (
                    participant_id,
                    RankSnapshot {
                        last_rank: rank_from_row(last_rank),
                        best_rank: rank_from_row(best_rank),
                    },
                )
            })
            .collect())
    }

    async fn put_all(&self, observations: &SnapshotPairs, seen_at: DateTime<Utc>) -> Result<()> {
        if observations.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for chunk in observations.chunks(SNAPSHOT_WRITE_CHUNK) {
            let rows: Vec<(String, i64, i64, DateTime<Utc>)> = chunk
                .iter()
                .map(|(participant_id, snapshot)| {
                    (
                        participant_id.clone(),
                        i64::from(snapshot.last_rank),
                        i64::from(snapshot.best_rank),
                        seen_at,
                    )
                })
                .collect();
            let mut query_builder = QueryBuilder::<Sqlite>::new(
                "INSERT INTO rank_snapshots (participant_id, last_rank, best_rank, last_seen_at) ",
            );
            query_builder.push_values(rows, |mut builder, row| {
                builder
                    .push_bind(row.0)
                    .push_bind(row.1)
                    .push_bind(row.2)
                    .push_bind(row.3);
            });
            query_builder.push(
                " ON CONFLICT(participant_id) DO UPDATE SET \
                 last_rank = excluded.last_rank, \
                 best_rank = excluded.best_rank, \
                 last_seen_at = excluded.last_seen_at",
            );
            query_builder.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn prune(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM rank_snapshots WHERE last_seen_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// In-memory store double, so ranking flows can be exercised without sqlite.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryRankStore {
    inner: std::sync::Mutex<HashMap<String, (RankSnapshot, DateTime<Utc>)>>,
}

#[cfg(test)]
#[async_trait]
impl RankStore for MemoryRankStore {
    async fn get(&self, participant_id: &str) -> Result<Option<RankSnapshot>> {
        Ok(self
            .inner
            .lock()
            .expect("store lock")
            .get(participant_id)
            .map(|(snapshot, _)| *snapshot))
    }

    async fn list(&self) -> Result<SnapshotPairs> {
        let mut pairs: SnapshotPairs = self
            .inner
            .lock()
            .expect("store lock")
            .iter()
            .map(|(participant_id, (snapshot, _))| (participant_id.clone(), *snapshot))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(pairs)
    }

    async fn put_all(&self, observations: &SnapshotPairs, seen_at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.lock().expect("store lock");
        for (participant_id, snapshot) in observations {
            inner.insert(participant_id.clone(), (*snapshot, seen_at));
        }
        Ok(())
    }

    async fn prune(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.lock().expect("store lock");
        let before = inner.len();
        inner.retain(|_, value| value.1 >= cutoff);
        Ok((before - inner.len()) as u64)
    }
}

/// Store double whose listed operations fail, for degraded-mode tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct FailingRankStore {
    inner: MemoryRankStore,
    fail_list: bool,
    fail_put: bool,
}

#[cfg(test)]
impl FailingRankStore {
    pub fn failing_list() -> Self {
        Self {
            fail_list: true,
            ..Self::default()
        }
    }

    pub fn failing_put() -> Self {
        Self {
            fail_put: true,
            ..Self::default()
        }
    }

    pub async fn seed(&self, observations: &SnapshotPairs, seen_at: DateTime<Utc>) {
        self.inner
            .put_all(observations, seen_at)
            .await
            .expect("memory seed");
    }
}

#[cfg(test)]
#[async_trait]
impl RankStore for FailingRankStore {
    async fn get(&self, participant_id: &str) -> Result<Option<RankSnapshot>> {
        self.inner.get(participant_id).await
    }

    async fn list(&self) -> Result<SnapshotPairs> {
        if self.fail_list {
            return Err(LeaderboardError::Store(sqlx::Error::PoolClosed));
        }
        self.inner.list().await
    }

    async fn put_all(&self, observations: &SnapshotPairs, seen_at: DateTime<Utc>) -> Result<()> {
        if self.fail_put {
            return Err(LeaderboardError::Store(sqlx::Error::PoolClosed));
        }
        self.inner.put_all(observations, seen_at).await
    }

    async fn prune(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.inner.prune(cutoff).await
    }
}
