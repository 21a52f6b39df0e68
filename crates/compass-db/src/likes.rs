//! Liked-organization repository implementation.
//!
//! The liked set is a (session_id, organization_id) pair table with a
//! composite primary key. Add and remove are each a single statement, so
//! concurrent swipes from the same session commute without locking.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use compass_core::{Error, LikedOrganizationRepository, Result};

/// PostgreSQL implementation of LikedOrganizationRepository.
pub struct PgLikedOrganizationRepository {
    pool: Pool<Postgres>,
}

impl PgLikedOrganizationRepository {
    /// Create a new PgLikedOrganizationRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn fetch_ids(&self, session_id: &str) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            "SELECT organization_id FROM liked_organization
             WHERE session_id = $1
             ORDER BY liked_at_utc, organization_id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter()
            .map(|row| row.try_get("organization_id").map_err(Error::Database))
            .collect()
    }
}

#[async_trait]
impl LikedOrganizationRepository for PgLikedOrganizationRepository {
    async fn add(&self, session_id: &str, organization_id: Uuid) -> Result<Vec<Uuid>> {
        // Repeat like keeps the original liked_at_utc, preserving
        // insertion order.
        sqlx::query(
            "INSERT INTO liked_organization (session_id, organization_id, liked_at_utc)
             VALUES ($1, $2, $3)
             ON CONFLICT (session_id, organization_id) DO NOTHING",
        )
        .bind(session_id)
        .bind(organization_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        self.fetch_ids(session_id).await
    }

    async fn remove(&self, session_id: &str, organization_id: Uuid) -> Result<()> {
        sqlx::query(
            "DELETE FROM liked_organization
             WHERE session_id = $1 AND organization_id = $2",
        )
        .bind(session_id)
        .bind(organization_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn list(&self, session_id: &str) -> Result<Vec<Uuid>> {
        self.fetch_ids(session_id).await
    }

    async fn clear(&self, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM liked_organization WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
