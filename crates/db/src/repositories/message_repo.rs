//! Repository for the `messages` table (event chat).

use eventpulse_core::types::DbId;
use sqlx::PgPool;

use crate::models::message::Message;

/// Default page size for chat history.
pub const RECENT_LIMIT: i64 = 50;

/// Provides chat persistence.
pub struct MessageRepo;

impl MessageRepo {
    /// Store a message and return it joined with the author's name and role.
    ///
    /// `content` should already be trimmed; `ck_messages_content_length`
    /// rejects anything outside 1..=500 codepoints.
    pub async fn create(
        pool: &PgPool,
        event_id: DbId,
        author_id: DbId,
        content: &str,
    ) -> Result<Message, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            "WITH inserted AS (
                INSERT INTO messages (event_id, author_id, content)
                VALUES ($1, $2, $3)
                RETURNING id, event_id, author_id, content, sent_at
             )
             SELECT m.id, m.event_id, m.author_id, u.display_name AS author_name,
                    u.role AS author_role, m.content, m.sent_at
             FROM inserted m
             JOIN users u ON u.id = m.author_id",
        )
        .bind(event_id)
        .bind(author_id)
        .bind(content)
        .fetch_one(pool)
        .await
    }

    /// The latest `limit` messages of an event, in chronological order.
    pub async fn list_recent(
        pool: &PgPool,
        event_id: DbId,
        limit: i64,
    ) -> Result<Vec<Message>, sqlx::Error> {
        let mut messages = sqlx::query_as::<_, Message>(
            "SELECT m.id, m.event_id, m.author_id, u.display_name AS author_name,
                    u.role AS author_role, m.content, m.sent_at
             FROM messages m
             JOIN users u ON u.id = m.author_id
             WHERE m.event_id = $1
             ORDER BY m.sent_at DESC, m.id DESC
             LIMIT $2",
        )
        .bind(event_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        messages.reverse();
        Ok(messages)
    }
}
