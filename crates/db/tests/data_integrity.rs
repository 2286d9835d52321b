//! Integration tests for schema-level invariants exercised through the
//! repositories: single active event, zone slug scoping, task completion
//! timestamps, chat length limits and ordering.

use assert_matches::assert_matches;
use eventpulse_core::event::EventState;
use eventpulse_core::incident::IncidentType;
use eventpulse_core::roles::Role;
use eventpulse_core::task::{completion_consistent, TaskPriority, TaskState};
use eventpulse_core::types::DbId;
use eventpulse_db::models::event::{CreateEvent, EndOutcome};
use eventpulse_db::models::incident::CreateIncident;
use eventpulse_db::models::task::{CreateTask, TaskEditOutcome, TaskPatch};
use eventpulse_db::models::user::CreateUser;
use eventpulse_db::models::zone::CreateZone;
use eventpulse_db::repositories::message_repo::RECENT_LIMIT;
use eventpulse_db::repositories::{
    EventRepo, IncidentRepo, MessageRepo, TaskRepo, UserRepo, ZoneRepo,
};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_user(handle: &str, role: Role, event_id: Option<DbId>) -> CreateUser {
    CreateUser {
        handle: handle.to_string(),
        display_name: format!("User {handle}"),
        password_hash: "not-a-real-hash".to_string(),
        role,
        event_id,
    }
}

fn new_event(name: &str, created_by: DbId) -> CreateEvent {
    CreateEvent {
        name: name.to_string(),
        description: String::new(),
        created_by,
    }
}

fn new_zone(event_id: DbId, slug: &str) -> CreateZone {
    CreateZone {
        event_id,
        slug: slug.to_string(),
        name: slug.to_uppercase(),
    }
}

fn new_task(event_id: DbId, created_by: DbId, assignee_id: Option<DbId>) -> CreateTask {
    CreateTask {
        event_id,
        zone_id: None,
        title: "Restock water".to_string(),
        description: String::new(),
        priority: TaskPriority::High,
        created_by,
        assignee_id,
    }
}

async fn admin(pool: &PgPool) -> DbId {
    UserRepo::create(pool, &new_user("admin", Role::Admin, None))
        .await
        .unwrap()
        .id
}

fn constraint_of(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.constraint().map(str::to_string),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_creating_event_ends_the_active_one(pool: PgPool) {
    let admin = admin(&pool).await;

    let first = EventRepo::create(&pool, &new_event("Day 1", admin)).await.unwrap();
    assert!(first.ended.is_none());

    let second = EventRepo::create(&pool, &new_event("Day 2", admin)).await.unwrap();
    let ended = second.ended.expect("first event should have been ended");
    assert_eq!(ended.id, first.event.id);
    assert_eq!(ended.state, EventState::Ended);
    assert!(ended.ended_at.is_some());

    let active = EventRepo::find_active(&pool).await.unwrap().unwrap();
    assert_eq!(active.id, second.event.id);

    let (active_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM events WHERE state = 'active'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(active_count, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_second_active_event_violates_unique_index(pool: PgPool) {
    let admin = admin(&pool).await;
    EventRepo::create(&pool, &new_event("Day 1", admin)).await.unwrap();

    let err = sqlx::query("INSERT INTO events (name, created_by) VALUES ('rogue', $1)")
        .bind(admin)
        .execute(&pool)
        .await
        .unwrap_err();
    assert_eq!(constraint_of(&err).as_deref(), Some("uq_events_single_active"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_end_event_outcomes(pool: PgPool) {
    let admin = admin(&pool).await;
    let created = EventRepo::create(&pool, &new_event("Day 1", admin)).await.unwrap();

    assert_matches!(
        EventRepo::end(&pool, created.event.id).await.unwrap(),
        EndOutcome::Ended(e) if e.state == EventState::Ended
    );
    assert_matches!(
        EventRepo::end(&pool, created.event.id).await.unwrap(),
        EndOutcome::AlreadyEnded
    );
    assert_matches!(
        EventRepo::end(&pool, uuid::Uuid::new_v4()).await.unwrap(),
        EndOutcome::NotFound
    );
    assert!(EventRepo::find_active(&pool).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Zones
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_zone_slug_unique_within_event_only(pool: PgPool) {
    let admin = admin(&pool).await;
    let e1 = EventRepo::create(&pool, &new_event("Day 1", admin)).await.unwrap().event;
    ZoneRepo::create(&pool, &new_zone(e1.id, "north-stand")).await.unwrap();

    let err = ZoneRepo::create(&pool, &new_zone(e1.id, "north-stand"))
        .await
        .unwrap_err();
    assert_eq!(constraint_of(&err).as_deref(), Some("uq_zones_event_slug"));

    let e2 = EventRepo::create(&pool, &new_event("Day 2", admin)).await.unwrap().event;
    let zone = ZoneRepo::create(&pool, &new_zone(e2.id, "north-stand")).await.unwrap();
    assert_eq!(zone.id, "north-stand");
    assert_eq!(zone.event_id, e2.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_incident_zone_must_belong_to_event(pool: PgPool) {
    let admin = admin(&pool).await;
    let e1 = EventRepo::create(&pool, &new_event("Day 1", admin)).await.unwrap().event;
    ZoneRepo::create(&pool, &new_zone(e1.id, "gate-a")).await.unwrap();
    let e2 = EventRepo::create(&pool, &new_event("Day 2", admin)).await.unwrap().event;

    let err = IncidentRepo::create(
        &pool,
        &CreateIncident {
            event_id: e2.id,
            zone_id: "gate-a".to_string(),
            kind: IncidentType::Other,
            description: "Lost child".to_string(),
            created_by: admin,
            assignee_id: None,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(constraint_of(&err).as_deref(), Some("fk_incidents_zone"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_zone_delete_refused_while_referenced(pool: PgPool) {
    let admin = admin(&pool).await;
    let e = EventRepo::create(&pool, &new_event("Day 1", admin)).await.unwrap().event;
    ZoneRepo::create(&pool, &new_zone(e.id, "gate-a")).await.unwrap();
    ZoneRepo::create(&pool, &new_zone(e.id, "gate-b")).await.unwrap();
    IncidentRepo::create(
        &pool,
        &CreateIncident {
            event_id: e.id,
            zone_id: "gate-a".to_string(),
            kind: IncidentType::Security,
            description: "Fight at the gate".to_string(),
            created_by: admin,
            assignee_id: None,
        },
    )
    .await
    .unwrap();

    let err = ZoneRepo::delete(&pool, e.id, "gate-a").await.unwrap_err();
    assert_eq!(constraint_of(&err).as_deref(), Some("fk_incidents_zone"));

    assert!(ZoneRepo::delete(&pool, e.id, "gate-b").await.unwrap());
    assert!(!ZoneRepo::delete(&pool, e.id, "gate-b").await.unwrap());
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_task_completed_at_tracks_state(pool: PgPool) {
    let admin = admin(&pool).await;
    let e = EventRepo::create(&pool, &new_event("Day 1", admin)).await.unwrap().event;
    let w = UserRepo::create(&pool, &new_user("ana", Role::Logistics, Some(e.id)))
        .await
        .unwrap();
    let task = TaskRepo::create(&pool, &new_task(e.id, admin, None)).await.unwrap();
    assert!(completion_consistent(task.state, task.completed_at));

    // Unassigned task: a worker changing its state takes it.
    let start = TaskPatch {
        state: Some(TaskState::InProgress),
        ..Default::default()
    };
    let task = match TaskRepo::update(&pool, task.id, &start, w.id, Role::Logistics)
        .await
        .unwrap()
    {
        TaskEditOutcome::Updated(t) => t,
        other => panic!("expected update, got {other:?}"),
    };
    assert_eq!(task.assignee_id, Some(w.id));
    assert!(task.completed_at.is_none());

    let done = TaskPatch {
        state: Some(TaskState::Completed),
        ..Default::default()
    };
    let task = match TaskRepo::update(&pool, task.id, &done, w.id, Role::Logistics)
        .await
        .unwrap()
    {
        TaskEditOutcome::Updated(t) => t,
        other => panic!("expected update, got {other:?}"),
    };
    assert_eq!(task.state, TaskState::Completed);
    assert!(completion_consistent(task.state, task.completed_at));

    let reopen = TaskPatch {
        state: Some(TaskState::Pending),
        ..Default::default()
    };
    assert_matches!(
        TaskRepo::update(&pool, task.id, &reopen, admin, Role::Admin).await.unwrap(),
        TaskEditOutcome::Invalid(_)
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_worker_cannot_touch_someone_elses_task(pool: PgPool) {
    let admin = admin(&pool).await;
    let e = EventRepo::create(&pool, &new_event("Day 1", admin)).await.unwrap().event;
    let owner = UserRepo::create(&pool, &new_user("ana", Role::Cleaning, Some(e.id)))
        .await
        .unwrap();
    let other = UserRepo::create(&pool, &new_user("beto", Role::Cleaning, Some(e.id)))
        .await
        .unwrap();
    let task = TaskRepo::create(&pool, &new_task(e.id, admin, Some(owner.id)))
        .await
        .unwrap();

    let start = TaskPatch {
        state: Some(TaskState::InProgress),
        ..Default::default()
    };
    assert_matches!(
        TaskRepo::update(&pool, task.id, &start, other.id, Role::Cleaning).await.unwrap(),
        TaskEditOutcome::Forbidden(_)
    );

    let steal = TaskPatch {
        assignee_id: Some(other.id),
        ..Default::default()
    };
    assert_matches!(
        TaskRepo::update(&pool, task.id, &steal, other.id, Role::Cleaning).await.unwrap(),
        TaskEditOutcome::Forbidden(_)
    );

    assert_matches!(
        TaskRepo::update(&pool, task.id, &steal, admin, Role::Admin).await.unwrap(),
        TaskEditOutcome::Updated(t) if t.assignee_id == Some(other.id)
    );
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_message_length_boundary(pool: PgPool) {
    let admin = admin(&pool).await;
    let e = EventRepo::create(&pool, &new_event("Day 1", admin)).await.unwrap().event;

    let exactly_500 = "ñ".repeat(500);
    let msg = MessageRepo::create(&pool, e.id, admin, &exactly_500).await.unwrap();
    assert_eq!(msg.content.chars().count(), 500);
    assert_eq!(msg.author_role, Role::Admin);

    let err = MessageRepo::create(&pool, e.id, admin, &"ñ".repeat(501))
        .await
        .unwrap_err();
    assert_eq!(constraint_of(&err).as_deref(), Some("ck_messages_content_length"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_recent_messages_are_latest_in_chronological_order(pool: PgPool) {
    let admin = admin(&pool).await;
    let e = EventRepo::create(&pool, &new_event("Day 1", admin)).await.unwrap().event;

    for i in 0..(RECENT_LIMIT + 5) {
        MessageRepo::create(&pool, e.id, admin, &format!("msg {i}"))
            .await
            .unwrap();
    }

    let recent = MessageRepo::list_recent(&pool, e.id, RECENT_LIMIT).await.unwrap();
    assert_eq!(recent.len() as i64, RECENT_LIMIT);
    assert_eq!(recent.first().unwrap().content, "msg 5");
    assert_eq!(recent.last().unwrap().content, format!("msg {}", RECENT_LIMIT + 4));
    assert!(recent.windows(2).all(|w| w[0].sent_at <= w[1].sent_at));
}
