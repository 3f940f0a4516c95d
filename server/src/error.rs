use thiserror::Error;

/// Failure classes for poll cycles and the snapshot store.
///
/// `Network` and `DuplicateParticipant` fail the cycle that raised them and
/// leave the previously published ranking untouched. `Store` never fails a
/// cycle: rank history degrades instead, with every delta reported as
/// `same`.
#[derive(Error, Debug)]
pub enum LeaderboardError {
    #[error("portfolio feed unavailable: {0}")]
    Network(String),

    #[error("duplicate participant id in feed response: {0}")]
    DuplicateParticipant(String),

    #[error("rank store error: {0}")]
    Store(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, LeaderboardError>;
