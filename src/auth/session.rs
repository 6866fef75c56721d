//! # Session Registry
//!
//! Server-side, revocable records of issued refresh tokens. Only the SHA-256
//! digest of a token is ever stored. A session is valid iff its row exists
//! and `expires_at > now`.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use metrics::{counter, histogram};
use rand::Rng;
use sea_orm::{ConnectionTrait, DatabaseConnection};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::db::with_timeout;
use crate::error::RepositoryError;
use crate::models::session::Model as SessionModel;
use crate::repositories::SessionRepository;

/// Upper bound on the random delay added to each sweep interval.
const SWEEP_JITTER_PCT: f64 = 0.1;

/// Hex-encoded SHA-256 of a refresh token.
pub fn hash_token(refresh_token: &str) -> String {
    hex::encode(Sha256::digest(refresh_token.as_bytes()))
}

pub struct SessionRegistry {
    db: DatabaseConnection,
    lifetime: Duration,
    timeout: StdDuration,
}

impl SessionRegistry {
    pub fn new(db: DatabaseConnection, lifetime: Duration, timeout: StdDuration) -> Self {
        Self {
            db,
            lifetime,
            timeout,
        }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        refresh_token: &str,
    ) -> Result<SessionModel, RepositoryError> {
        self.create_with(&self.db, user_id, refresh_token).await
    }

    /// Record a session on an explicit connection, e.g. inside the
    /// transaction that also creates the user.
    pub async fn create_with<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: Uuid,
        refresh_token: &str,
    ) -> Result<SessionModel, RepositoryError> {
        let expires_at = Utc::now() + self.lifetime;
        with_timeout(
            self.timeout,
            SessionRepository::new(conn).insert(user_id, hash_token(refresh_token), expires_at),
        )
        .await
    }

    pub async fn is_valid(&self, refresh_token: &str) -> Result<bool, RepositoryError> {
        let token_hash = hash_token(refresh_token);
        let session = with_timeout(
            self.timeout,
            SessionRepository::new(&self.db).find_unexpired(&token_hash, Utc::now()),
        )
        .await?;
        Ok(session.is_some())
    }

    /// Delete the matching unexpired session in a single statement; of two
    /// concurrent callers at most one observes `true`.
    pub async fn invalidate(&self, refresh_token: &str) -> Result<bool, RepositoryError> {
        let token_hash = hash_token(refresh_token);
        let removed = with_timeout(
            self.timeout,
            SessionRepository::new(&self.db).delete_unexpired(&token_hash, Utc::now()),
        )
        .await?;
        Ok(removed > 0)
    }

    /// Delete every expired session. Returns how many rows went.
    pub async fn sweep_expired(&self) -> Result<u64, RepositoryError> {
        let removed = with_timeout(
            self.timeout,
            SessionRepository::new(&self.db).delete_expired(Utc::now()),
        )
        .await?;
        counter!("auth_sessions_swept_total").increment(removed);
        Ok(removed)
    }
}

/// Periodic expiry sweep, stopped by a cancellation token.
pub struct SessionSweeper {
    registry: Arc<SessionRegistry>,
    interval: StdDuration,
}

impl SessionSweeper {
    pub fn new(registry: Arc<SessionRegistry>, interval: StdDuration) -> Self {
        Self { registry, interval }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    #[instrument(skip_all)]
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Starting session sweeper");

        loop {
            let delay = self.interval + sample_jitter(self.interval, &mut rand::thread_rng());
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Session sweeper shutdown requested");
                    break;
                }
                _ = sleep(delay) => {
                    let started = Instant::now();
                    match self.registry.sweep_expired().await {
                        Ok(removed) => debug!(removed, "Swept expired sessions"),
                        Err(err) => error!(error = %err, "Session sweep failed"),
                    }
                    histogram!("auth_session_sweep_duration_ms")
                        .record(started.elapsed().as_secs_f64() * 1_000.0);
                }
            }
        }

        info!("Session sweeper stopped");
    }
}

fn sample_jitter<R: Rng + ?Sized>(interval: StdDuration, rng: &mut R) -> StdDuration {
    let max_ms = (interval.as_millis() as f64 * SWEEP_JITTER_PCT) as u64;
    if max_ms == 0 {
        return StdDuration::ZERO;
    }
    StdDuration::from_millis(rng.gen_range(0..=max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_hash_is_sha256_hex() {
        let digest = hash_token("refresh-token");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, hash_token("refresh-token"));
        assert_ne!(digest, hash_token("refresh-token-2"));
        assert_eq!(
            hash_token(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_jitter_bounded() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let interval = StdDuration::from_secs(300);
        for _ in 0..100 {
            assert!(sample_jitter(interval, &mut rng) <= StdDuration::from_secs(30));
        }
        assert_eq!(
            sample_jitter(StdDuration::from_millis(5), &mut rng),
            StdDuration::ZERO
        );
    }
}
