//! Repository for the `tasks` table.

use eventpulse_core::roles::Role;
use eventpulse_core::task::{check_task_transition, TaskState};
use eventpulse_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::task::{CreateTask, Task, TaskEditOutcome, TaskPatch};

/// Task row joined with its (optional) zone name and assignee display name.
const SELECT_JOINED: &str = "\
    SELECT t.id, t.event_id, t.zone_slug AS zone_id, z.name AS zone_name, t.title, \
           t.description, t.state, t.priority, t.created_by, t.assignee_id, \
           u.display_name AS assignee_name, t.created_at, t.completed_at \
    FROM tasks t \
    LEFT JOIN zones z ON z.event_id = t.event_id AND z.slug = t.zone_slug \
    LEFT JOIN users u ON u.id = t.assignee_id";

/// Provides CRUD operations for tasks.
pub struct TaskRepo;

impl TaskRepo {
    /// Insert a new pending task.
    pub async fn create(pool: &PgPool, input: &CreateTask) -> Result<Task, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let (id,): (DbId,) = sqlx::query_as(
            "INSERT INTO tasks (event_id, zone_slug, title, description, priority, created_by, assignee_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING id",
        )
        .bind(input.event_id)
        .bind(&input.zone_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.priority)
        .bind(input.created_by)
        .bind(input.assignee_id)
        .fetch_one(&mut *tx)
        .await?;

        let task = fetch_joined(&mut *tx, id).await?.ok_or(sqlx::Error::RowNotFound)?;
        tx.commit().await?;
        Ok(task)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Task>, sqlx::Error> {
        fetch_joined(pool, id).await
    }

    /// List an event's tasks, highest priority first, then newest first.
    pub async fn list(pool: &PgPool, event_id: DbId) -> Result<Vec<Task>, sqlx::Error> {
        let query = format!(
            "{SELECT_JOINED} WHERE t.event_id = $1 ORDER BY t.priority, t.created_at DESC"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(event_id)
            .fetch_all(pool)
            .await
    }

    /// Apply a task edit on behalf of `actor_id`.
    ///
    /// Admins may change anything. Workers may only change the state of a
    /// task that is theirs or unassigned; changing an unassigned task
    /// assigns it to them. `completed_at` follows the state in the same
    /// statement.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        patch: &TaskPatch,
        actor_id: DbId,
        actor_role: Role,
    ) -> Result<TaskEditOutcome, sqlx::Error> {
        if patch.is_empty() {
            return Ok(TaskEditOutcome::Invalid("no fields to update".to_string()));
        }

        let mut tx = pool.begin().await?;

        let locked: Option<(DbId, TaskState, Option<DbId>)> = sqlx::query_as(
            "SELECT event_id, state, assignee_id FROM tasks WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((event_id, current, current_assignee)) = locked else {
            return Ok(TaskEditOutcome::NotFound);
        };

        let mut assignee = patch.assignee_id;
        if !actor_role.is_admin() {
            if patch.priority.is_some() || patch.assignee_id.is_some_and(|a| a != actor_id) {
                return Ok(TaskEditOutcome::Forbidden(
                    "only admins may reassign or reprioritize tasks".to_string(),
                ));
            }
            match current_assignee {
                Some(owner) if owner != actor_id => {
                    return Ok(TaskEditOutcome::Forbidden(
                        "task is assigned to someone else".to_string(),
                    ));
                }
                Some(_) => {}
                None => assignee = Some(actor_id),
            }
        } else if let Some(assignee_id) = patch.assignee_id {
            let eligible: Option<(DbId,)> = sqlx::query_as(
                "SELECT id FROM users WHERE id = $1 AND is_active AND event_id = $2",
            )
            .bind(assignee_id)
            .bind(event_id)
            .fetch_optional(&mut *tx)
            .await?;
            if eligible.is_none() {
                return Ok(TaskEditOutcome::Invalid(format!(
                    "user {assignee_id} is not part of this event"
                )));
            }
        }

        let next = patch.state.unwrap_or(current);
        if let Err(reason) = check_task_transition(current, next) {
            return Ok(TaskEditOutcome::Invalid(reason));
        }

        sqlx::query(
            "UPDATE tasks SET
                state = $2,
                assignee_id = COALESCE($3, assignee_id),
                priority = COALESCE($4, priority),
                completed_at = CASE WHEN $2 = 'completed'::task_state
                                    THEN COALESCE(completed_at, NOW())
                                    ELSE NULL END
             WHERE id = $1",
        )
        .bind(id)
        .bind(next)
        .bind(assignee)
        .bind(patch.priority)
        .execute(&mut *tx)
        .await?;

        let task = fetch_joined(&mut *tx, id).await?.ok_or(sqlx::Error::RowNotFound)?;
        tx.commit().await?;
        Ok(TaskEditOutcome::Updated(task))
    }
}

async fn fetch_joined<'e, E>(executor: E, id: DbId) -> Result<Option<Task>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let query = format!("{SELECT_JOINED} WHERE t.id = $1");
    sqlx::query_as::<_, Task>(&query)
        .bind(id)
        .fetch_optional(executor)
        .await
}
