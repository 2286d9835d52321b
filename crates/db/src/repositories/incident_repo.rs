//! Repository for the `incidents` and `incident_history` tables.
//!
//! Home of the claim protocol. A claim takes a non-blocking row lock
//! (`FOR UPDATE SKIP LOCKED`): among concurrent claimers exactly one sees
//! the row, the rest see nothing and report who won instead of queueing
//! behind the leader. Every state change appends a history row in the same
//! transaction as the update.

use eventpulse_core::incident::{check_transition, ClaimConflict, IncidentState};
use eventpulse_core::roles::Role;
use eventpulse_core::types::DbId;
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::models::incident::{
    ClaimOutcome, CreateIncident, EditOutcome, Incident, IncidentHistoryEntry, IncidentPatch,
    ResolveOutcome,
};

/// Incident row joined with its zone name and assignee display name.
const SELECT_JOINED: &str = "\
    SELECT i.id, i.event_id, i.zone_slug AS zone_id, z.name AS zone_name, i.type AS kind, \
           i.description, i.state, i.created_by, i.assignee_id, \
           u.display_name AS assignee_name, i.created_at, i.updated_at \
    FROM incidents i \
    JOIN zones z ON z.event_id = i.event_id AND z.slug = i.zone_slug \
    LEFT JOIN users u ON u.id = i.assignee_id";

/// Provides the incident lifecycle: create, claim, resolve, admin edit.
pub struct IncidentRepo;

impl IncidentRepo {
    /// File a new pending incident.
    ///
    /// The zone must belong to `input.event_id`; otherwise `fk_incidents_zone`
    /// rejects the insert.
    pub async fn create(pool: &PgPool, input: &CreateIncident) -> Result<Incident, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let (id,): (DbId,) = sqlx::query_as(
            "INSERT INTO incidents (event_id, zone_slug, type, description, created_by, assignee_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id",
        )
        .bind(input.event_id)
        .bind(&input.zone_id)
        .bind(input.kind)
        .bind(&input.description)
        .bind(input.created_by)
        .bind(input.assignee_id)
        .fetch_one(&mut *tx)
        .await?;

        let incident = fetch_joined(&mut *tx, id).await?.ok_or(sqlx::Error::RowNotFound)?;
        tx.commit().await?;
        Ok(incident)
    }

    /// Find an incident by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Incident>, sqlx::Error> {
        fetch_joined(pool, id).await
    }

    /// List an event's incidents, newest first.
    pub async fn list(pool: &PgPool, event_id: DbId) -> Result<Vec<Incident>, sqlx::Error> {
        let query = format!("{SELECT_JOINED} WHERE i.event_id = $1 ORDER BY i.created_at DESC");
        sqlx::query_as::<_, Incident>(&query)
            .bind(event_id)
            .fetch_all(pool)
            .await
    }

    /// Atomically claim a pending incident for `actor_id`.
    ///
    /// Exactly one of any number of concurrent claims on the same pending
    /// incident returns [`ClaimOutcome::Claimed`]; the others return
    /// [`ClaimOutcome::Conflict`] naming the winner when it is known.
    pub async fn claim(pool: &PgPool, id: DbId, actor_id: DbId) -> Result<ClaimOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let locked: Option<(IncidentState,)> =
            sqlx::query_as("SELECT state FROM incidents WHERE id = $1 FOR UPDATE SKIP LOCKED")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let state = match locked {
            Some((state,)) => state,
            None => {
                // Locked by another transaction, or missing. Look without a lock.
                tx.rollback().await?;
                return Self::unlocked_conflict(pool, id).await;
            }
        };

        match state {
            IncidentState::Pending => {}
            IncidentState::InAttention => {
                let winner_name = assignee_name(&mut *tx, id).await?;
                return Ok(ClaimOutcome::Conflict(ClaimConflict::AlreadyClaimed { winner_name }));
            }
            IncidentState::Resolved => {
                return Ok(ClaimOutcome::Conflict(ClaimConflict::NotPending { state }));
            }
        }

        sqlx::query(
            "UPDATE incidents SET state = $2, assignee_id = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(IncidentState::InAttention)
        .bind(actor_id)
        .execute(&mut *tx)
        .await?;

        insert_history(&mut *tx, id, IncidentState::Pending, IncidentState::InAttention, actor_id)
            .await?;

        let incident = fetch_joined(&mut *tx, id).await?.ok_or(sqlx::Error::RowNotFound)?;
        tx.commit().await?;

        tracing::debug!(incident_id = %id, user_id = %actor_id, "Incident claimed");
        Ok(ClaimOutcome::Claimed(incident))
    }

    /// Classify a claim whose locking read returned no row.
    async fn unlocked_conflict(pool: &PgPool, id: DbId) -> Result<ClaimOutcome, sqlx::Error> {
        let row: Option<(IncidentState, Option<String>)> = sqlx::query_as(
            "SELECT i.state, u.display_name
             FROM incidents i
             LEFT JOIN users u ON u.id = i.assignee_id
             WHERE i.id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(match row {
            None => ClaimOutcome::NotFound,
            Some((IncidentState::Resolved, _)) => ClaimOutcome::Conflict(ClaimConflict::NotPending {
                state: IncidentState::Resolved,
            }),
            Some((_, winner_name)) => {
                ClaimOutcome::Conflict(ClaimConflict::InFlight { winner_name })
            }
        })
    }

    /// Resolve an incident.
    ///
    /// `in_attention -> resolved` is allowed for the assignee, supervisors and
    /// admins. `pending -> resolved` skips the claim and only admins may do
    /// it. The assignee is kept.
    pub async fn resolve(
        pool: &PgPool,
        id: DbId,
        actor_id: DbId,
        actor_role: Role,
    ) -> Result<ResolveOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let locked: Option<(IncidentState, Option<DbId>)> =
            sqlx::query_as("SELECT state, assignee_id FROM incidents WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((state, assignee_id)) = locked else {
            return Ok(ResolveOutcome::NotFound);
        };

        let allowed = match state {
            IncidentState::Resolved => return Ok(ResolveOutcome::AlreadyResolved),
            IncidentState::Pending => {
                check_transition(state, IncidentState::Resolved, actor_role).is_ok()
            }
            IncidentState::InAttention => {
                assignee_id == Some(actor_id) || actor_role.is_elevated()
            }
        };
        if !allowed {
            return Ok(ResolveOutcome::NotAllowed);
        }

        sqlx::query("UPDATE incidents SET state = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(IncidentState::Resolved)
            .execute(&mut *tx)
            .await?;

        insert_history(&mut *tx, id, state, IncidentState::Resolved, actor_id).await?;

        let incident = fetch_joined(&mut *tx, id).await?.ok_or(sqlx::Error::RowNotFound)?;
        tx.commit().await?;
        Ok(ResolveOutcome::Resolved(incident))
    }

    /// Apply an admin edit of state and/or assignee.
    ///
    /// The caller is responsible for the admin check. An empty patch is
    /// rejected as [`EditOutcome::Invalid`].
    pub async fn edit(
        pool: &PgPool,
        id: DbId,
        patch: &IncidentPatch,
        actor_id: DbId,
    ) -> Result<EditOutcome, sqlx::Error> {
        if patch.is_empty() {
            return Ok(EditOutcome::Invalid("no fields to update".to_string()));
        }

        let mut tx = pool.begin().await?;

        let locked: Option<(DbId, IncidentState, Option<DbId>)> = sqlx::query_as(
            "SELECT event_id, state, assignee_id FROM incidents WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((event_id, current, current_assignee)) = locked else {
            return Ok(EditOutcome::NotFound);
        };

        if let Some(assignee_id) = patch.assignee_id {
            let eligible: Option<(DbId,)> = sqlx::query_as(
                "SELECT id FROM users
                 WHERE id = $1 AND is_active AND (event_id = $2 OR role = 'admin')",
            )
            .bind(assignee_id)
            .bind(event_id)
            .fetch_optional(&mut *tx)
            .await?;
            if eligible.is_none() {
                return Ok(EditOutcome::Invalid(format!(
                    "user {assignee_id} is not part of this event"
                )));
            }
        }

        let target = patch.state.filter(|s| *s != current);
        if let Some(to) = target {
            if let Err(e) = check_transition(current, to, Role::Admin) {
                return Ok(EditOutcome::Invalid(e.to_string()));
            }
            if to == IncidentState::InAttention
                && patch.assignee_id.or(current_assignee).is_none()
            {
                return Ok(EditOutcome::Invalid(
                    "in_attention requires an assignee".to_string(),
                ));
            }
        }

        sqlx::query(
            "UPDATE incidents SET
                state = COALESCE($2, state),
                assignee_id = COALESCE($3, assignee_id),
                updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(target)
        .bind(patch.assignee_id)
        .execute(&mut *tx)
        .await?;

        if let Some(to) = target {
            insert_history(&mut *tx, id, current, to, actor_id).await?;
        }

        let incident = fetch_joined(&mut *tx, id).await?.ok_or(sqlx::Error::RowNotFound)?;
        tx.commit().await?;
        Ok(EditOutcome::Updated(incident))
    }

    /// The incident's transition log, oldest first.
    pub async fn history(
        pool: &PgPool,
        incident_id: DbId,
    ) -> Result<Vec<IncidentHistoryEntry>, sqlx::Error> {
        sqlx::query_as::<_, IncidentHistoryEntry>(
            "SELECT h.id, h.incident_id, h.from_state, h.to_state, h.actor_id,
                    u.display_name AS actor_name, h.created_at
             FROM incident_history h
             JOIN users u ON u.id = h.actor_id
             WHERE h.incident_id = $1
             ORDER BY h.created_at, h.id",
        )
        .bind(incident_id)
        .fetch_all(pool)
        .await
    }
}

async fn fetch_joined<'e, E>(executor: E, id: DbId) -> Result<Option<Incident>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let query = format!("{SELECT_JOINED} WHERE i.id = $1");
    sqlx::query_as::<_, Incident>(&query)
        .bind(id)
        .fetch_optional(executor)
        .await
}

async fn assignee_name(conn: &mut PgConnection, id: DbId) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(Option<String>,)> = sqlx::query_as(
        "SELECT u.display_name
         FROM incidents i
         LEFT JOIN users u ON u.id = i.assignee_id
         WHERE i.id = $1",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row.and_then(|(name,)| name))
}

async fn insert_history(
    conn: &mut PgConnection,
    incident_id: DbId,
    from: IncidentState,
    to: IncidentState,
    actor_id: DbId,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO incident_history (incident_id, from_state, to_state, actor_id)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(incident_id)
    .bind(from)
    .bind(to)
    .bind(actor_id)
    .execute(conn)
    .await?;
    Ok(())
}
