//! # compass-db
//!
//! PostgreSQL database layer for Cause Compass.
//!
//! This crate provides:
//! - Connection pool management
//! - The per-session preference document store
//! - The per-session liked-organization set store
//! - The read-mostly nonprofit organization catalog with conjunctive
//!   filtered search and the recommendable-subset query
//!
//! ## Example
//!
//! ```rust,ignore
//! use compass_db::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/compass").await?;
//!
//!     let liked = db.likes.add("session-abc", org_id).await?;
//!     println!("Liked {} organizations", liked.len());
//!     Ok(())
//! }
//! ```
pub mod catalog_filter;
pub mod likes;
pub mod organizations;
pub mod pool;
pub mod preferences;

#[cfg(test)]
mod tests;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use compass_core::*;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

// Re-export repository implementations
pub use catalog_filter::{CatalogFilterQueryBuilder, QueryParam};
pub use likes::PgLikedOrganizationRepository;
pub use organizations::PgOrganizationCatalog;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use preferences::PgPreferenceRepository;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Per-session preference document store.
    pub preferences: PgPreferenceRepository,
    /// Per-session liked-organization set store.
    pub likes: PgLikedOrganizationRepository,
    /// Nonprofit organization catalog.
    pub catalog: PgOrganizationCatalog,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            preferences: PgPreferenceRepository::new(pool.clone()),
            likes: PgLikedOrganizationRepository::new(pool.clone()),
            catalog: PgOrganizationCatalog::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Connect to test database (for integration tests).
    #[cfg(test)]
    pub async fn connect_test() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| crate::test_fixtures::DEFAULT_TEST_DATABASE_URL.to_string());
        Self::connect(&database_url).await
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_escape_like_handles_wildcards() {
        assert_eq!(escape_like("50% _done_"), "50\\% \\_done\\_");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
        assert_eq!(escape_like("plain"), "plain");
    }
}
