//! Repository for the `events` table.
//!
//! At most one event is active. Creating an event ends the current one in
//! the same transaction; the partial unique index `uq_events_single_active`
//! turns a concurrent double-create into a unique violation.

use eventpulse_core::types::DbId;
use sqlx::PgPool;

use crate::models::event::{CreateEvent, CreatedEvent, EndOutcome, Event};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, description, state, created_by, created_at, ended_at";

/// Provides lifecycle operations for events.
pub struct EventRepo;

impl EventRepo {
    /// End the active event (if any) and insert a new active one.
    pub async fn create(pool: &PgPool, input: &CreateEvent) -> Result<CreatedEvent, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let end_query = format!(
            "UPDATE events SET state = 'ended', ended_at = NOW()
             WHERE state = 'active'
             RETURNING {COLUMNS}"
        );
        let ended = sqlx::query_as::<_, Event>(&end_query)
            .fetch_optional(&mut *tx)
            .await?;

        let insert_query = format!(
            "INSERT INTO events (name, description, created_by)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        let event = sqlx::query_as::<_, Event>(&insert_query)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.created_by)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(CreatedEvent { event, ended })
    }

    /// The most recently created active event, if any.
    pub async fn find_active(pool: &PgPool) -> Result<Option<Event>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM events
             WHERE state = 'active'
             ORDER BY created_at DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, Event>(&query).fetch_optional(pool).await
    }

    /// Find an event by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Event>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM events WHERE id = $1");
        sqlx::query_as::<_, Event>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all events, newest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<Event>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM events ORDER BY created_at DESC");
        sqlx::query_as::<_, Event>(&query).fetch_all(pool).await
    }

    /// Move an active event to `ended`.
    pub async fn end(pool: &PgPool, id: DbId) -> Result<EndOutcome, sqlx::Error> {
        let query = format!(
            "UPDATE events SET state = 'ended', ended_at = NOW()
             WHERE id = $1 AND state = 'active'
             RETURNING {COLUMNS}"
        );
        if let Some(event) = sqlx::query_as::<_, Event>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?
        {
            return Ok(EndOutcome::Ended(event));
        }

        match Self::find_by_id(pool, id).await? {
            Some(_) => Ok(EndOutcome::AlreadyEnded),
            None => Ok(EndOutcome::NotFound),
        }
    }
}
