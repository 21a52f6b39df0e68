//! Preference repository implementation.
//!
//! One row per session. Every write is a single atomic upsert statement:
//! wholesale replace for `upsert`, column-wise COALESCE merge for
//! `update_partial`. Absence of a row is the empty default, never an error.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};

use compass_core::{
    parse_tags, Error, LocationAnswer, OpenEndedReflection, Preferences, PreferenceRepository,
    PreferencesPatch, Result,
};

/// PostgreSQL implementation of PreferenceRepository.
pub struct PgPreferenceRepository {
    pool: Pool<Postgres>,
}

impl PgPreferenceRepository {
    /// Create a new PgPreferenceRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn prefs_from_row(row: &PgRow) -> Result<Preferences> {
    let open_ended = row
        .try_get::<Option<JsonValue>, _>("open_ended")
        .map_err(Error::Database)?
        .map(serde_json::from_value::<OpenEndedReflection>)
        .transpose()
        .map_err(|e| Error::Validation(format!("stored open_ended is malformed: {}", e)))?;

    let causes: Vec<String> = row
        .try_get::<Option<Vec<String>>, _>("causes")
        .map_err(Error::Database)?
        .unwrap_or_default();
    let help_methods: Vec<String> = row
        .try_get::<Option<Vec<String>>, _>("help_methods")
        .map_err(Error::Database)?
        .unwrap_or_default();

    let change_scope = row
        .try_get::<Option<String>, _>("change_scope")
        .map_err(Error::Database)?
        .map(|s| s.parse())
        .transpose()?;

    let location = row
        .try_get::<Option<JsonValue>, _>("location")
        .map_err(Error::Database)?
        .map(serde_json::from_value::<LocationAnswer>)
        .transpose()
        .map_err(|e| Error::Validation(format!("stored location is malformed: {}", e)))?;

    Ok(Preferences {
        open_ended,
        causes: parse_tags(&causes)?,
        help_methods: parse_tags(&help_methods)?,
        change_scope,
        location,
    })
}

fn open_ended_json(open_ended: &Option<OpenEndedReflection>) -> Result<Option<JsonValue>> {
    open_ended
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(Error::from)
}

fn location_json(location: &Option<LocationAnswer>) -> Result<Option<JsonValue>> {
    location
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(Error::from)
}

fn tag_strings<T: ToString>(tags: &[T]) -> Vec<String> {
    tags.iter().map(T::to_string).collect()
}

#[async_trait]
impl PreferenceRepository for PgPreferenceRepository {
    async fn upsert(&self, session_id: &str, prefs: Preferences) -> Result<Preferences> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO user_preferences
                (session_id, open_ended, causes, help_methods, change_scope, location,
                 created_at_utc, updated_at_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ON CONFLICT (session_id) DO UPDATE SET
                open_ended = EXCLUDED.open_ended,
                causes = EXCLUDED.causes,
                help_methods = EXCLUDED.help_methods,
                change_scope = EXCLUDED.change_scope,
                location = EXCLUDED.location,
                updated_at_utc = EXCLUDED.updated_at_utc
            "#,
        )
        .bind(session_id)
        .bind(open_ended_json(&prefs.open_ended)?)
        .bind(tag_strings(&prefs.causes))
        .bind(tag_strings(&prefs.help_methods))
        .bind(prefs.change_scope.map(|s| s.to_string()))
        .bind(location_json(&prefs.location)?)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(prefs)
    }

    async fn get(&self, session_id: &str) -> Result<Preferences> {
        let row = sqlx::query(
            "SELECT open_ended, causes, help_methods, change_scope, location
             FROM user_preferences WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(row) => prefs_from_row(&row),
            None => Ok(Preferences::default()),
        }
    }

    async fn update_partial(
        &self,
        session_id: &str,
        patch: PreferencesPatch,
    ) -> Result<Preferences> {
        let now = Utc::now();

        // NULL binds fall through COALESCE, so unnamed fields keep their
        // stored value; on first write the row is created from the patch.
        let row = sqlx::query(
            r#"
            INSERT INTO user_preferences
                (session_id, open_ended, causes, help_methods, change_scope, location,
                 created_at_utc, updated_at_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ON CONFLICT (session_id) DO UPDATE SET
                open_ended = COALESCE(EXCLUDED.open_ended, user_preferences.open_ended),
                causes = COALESCE(EXCLUDED.causes, user_preferences.causes),
                help_methods = COALESCE(EXCLUDED.help_methods, user_preferences.help_methods),
                change_scope = COALESCE(EXCLUDED.change_scope, user_preferences.change_scope),
                location = COALESCE(EXCLUDED.location, user_preferences.location),
                updated_at_utc = EXCLUDED.updated_at_utc
            RETURNING open_ended, causes, help_methods, change_scope, location
            "#,
        )
        .bind(session_id)
        .bind(open_ended_json(&patch.open_ended)?)
        .bind(patch.causes.as_deref().map(tag_strings))
        .bind(patch.help_methods.as_deref().map(tag_strings))
        .bind(patch.change_scope.map(|s| s.to_string()))
        .bind(location_json(&patch.location)?)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        prefs_from_row(&row)
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM user_preferences WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
