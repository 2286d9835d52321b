//! Repository for the `zones` table (composite key `event_id` x `slug`).

use eventpulse_core::types::DbId;
use sqlx::PgPool;

use crate::models::zone::{CreateZone, Zone};

const COLUMNS: &str = "slug AS id, event_id, name, created_at";

/// Provides CRUD operations for zones.
pub struct ZoneRepo;

impl ZoneRepo {
    /// Insert a zone. A slug collision within the event violates
    /// `uq_zones_event_slug`; the same slug in another event is fine.
    pub async fn create(pool: &PgPool, input: &CreateZone) -> Result<Zone, sqlx::Error> {
        let query = format!(
            "INSERT INTO zones (event_id, slug, name)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Zone>(&query)
            .bind(input.event_id)
            .bind(&input.slug)
            .bind(&input.name)
            .fetch_one(pool)
            .await
    }

    /// List an event's zones by name.
    pub async fn list(pool: &PgPool, event_id: DbId) -> Result<Vec<Zone>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM zones WHERE event_id = $1 ORDER BY name");
        sqlx::query_as::<_, Zone>(&query)
            .bind(event_id)
            .fetch_all(pool)
            .await
    }

    pub async fn find(pool: &PgPool, event_id: DbId, slug: &str) -> Result<Option<Zone>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM zones WHERE event_id = $1 AND slug = $2");
        sqlx::query_as::<_, Zone>(&query)
            .bind(event_id)
            .bind(slug)
            .fetch_optional(pool)
            .await
    }

    /// Delete a zone. Returns `false` if it did not exist.
    ///
    /// Fails with a foreign-key violation while incidents or tasks still
    /// reference the zone.
    pub async fn delete(pool: &PgPool, event_id: DbId, slug: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM zones WHERE event_id = $1 AND slug = $2")
            .bind(event_id)
            .bind(slug)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
