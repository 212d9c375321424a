// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Postgres-backed [`PersistenceGateway`]. Grounded on the teacher's
//! `storage_provider::postgres::qs`: `PgPool`, transactions via
//! `pool.begin()`, `FOR UPDATE SKIP LOCKED` for safe concurrent sweeps.
//!
//! Unlike the teacher we use the runtime-checked `sqlx::query`/`query_as`
//! API rather than the `query!` macro family: the macros need a live
//! database (or a committed `.sqlx` offline cache) at compile time, neither
//! of which exists for this crate yet.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::domain::{
    Conversation, ConversationId, FriendRequest, FriendSummary, Identity, Message, MessageId,
    MessageType, PushRegistration, RequestId,
};
use crate::errors::GatewayError;

use super::{ExpiredMessage, PersistenceGateway, RemoveConversationOutcome, Result};

pub struct PostgresGateway {
    pool: PgPool,
}

impl PostgresGateway {
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(connection_string)
            .await
            .map_err(GatewayError::from)?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| GatewayError::Storage(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_message(row: &sqlx::postgres::PgRow) -> Result<Message> {
        let message_type: String = row.try_get("message_type")?;
        let message_type = if message_type == "GIF" {
            MessageType::Gif
        } else {
            MessageType::Text
        };
        Ok(Message {
            message_id: MessageId(row.try_get("message_id")?),
            conversation_id: ConversationId(row.try_get("conversation_id")?),
            author: Identity(row.try_get("author")?),
            content: row.try_get("content")?,
            message_type,
            gif_url: row.try_get("gif_url")?,
            self_destruct_minutes: row.try_get("self_destruct_minutes")?,
            send_time: row.try_get("send_time")?,
            viewed: row.try_get("viewed")?,
            delete_time: row.try_get("delete_time")?,
        })
    }
}

#[async_trait]
impl PersistenceGateway for PostgresGateway {
    async fn create_user_if_missing(&self, identity: &Identity) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (account, friend_requests_blob, friends_blob) \
             VALUES ($1, '[]', '[]') ON CONFLICT (account) DO NOTHING",
        )
        .bind(identity.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_friends(&self, identity: &Identity) -> Result<Vec<FriendSummary>> {
        let rows = sqlx::query(
            "SELECT c.conversation_id, c.members_blob FROM conversations c \
             WHERE c.members_blob::jsonb ? $1",
        )
        .bind(identity.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let conversation_id: uuid::Uuid = row.try_get("conversation_id")?;
            let conversation_id = ConversationId(conversation_id);
            let members_blob: String = row.try_get("members_blob")?;
            let members: Vec<String> = serde_json::from_str(&members_blob)?;
            let friend = members
                .into_iter()
                .find(|m| m != identity.as_str())
                .map(Identity::from)
                .ok_or_else(|| GatewayError::Storage("malformed members_blob".into()))?;

            let unread_count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM messages \
                 WHERE conversation_id = $1 AND author <> $2 \
                 AND (viewed = false OR viewed IS NULL)",
            )
            .bind(conversation_id.0)
            .bind(identity.as_str())
            .fetch_one(&self.pool)
            .await?;

            let last_message_preview: Option<String> = sqlx::query_scalar(
                "SELECT content FROM messages WHERE conversation_id = $1 \
                 ORDER BY send_time DESC LIMIT 1",
            )
            .bind(conversation_id.0)
            .fetch_optional(&self.pool)
            .await?;

            out.push(FriendSummary {
                friend,
                conversation_id,
                unread_count,
                last_message_preview,
                online: false,
            });
        }
        Ok(out)
    }

    async fn get_incoming_requests(&self, identity: &Identity) -> Result<Vec<FriendRequest>> {
        let rows = sqlx::query(
            "SELECT request_id, sender, recipient, create_time, message \
             FROM friend_requests WHERE recipient = $1",
        )
        .bind(identity.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_request).collect()
    }

    async fn get_outgoing_requests(&self, identity: &Identity) -> Result<Vec<FriendRequest>> {
        let rows = sqlx::query(
            "SELECT request_id, sender, recipient, create_time, message \
             FROM friend_requests WHERE sender = $1",
        )
        .bind(identity.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_request).collect()
    }

    async fn create_friend_request(
        &self,
        sender: &Identity,
        recipient: &Identity,
        message: Option<String>,
    ) -> Result<RequestId> {
        let mut tx = self.pool.begin().await?;

        let recipient_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE account = $1)",
        )
        .bind(recipient.as_str())
        .fetch_one(&mut *tx)
        .await?;
        if !recipient_exists {
            return Err(GatewayError::NotFound);
        }

        let pending: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM friend_requests WHERE sender = $1 AND recipient = $2)",
        )
        .bind(sender.as_str())
        .bind(recipient.as_str())
        .fetch_one(&mut *tx)
        .await?;
        if pending {
            return Err(GatewayError::AlreadyExists);
        }

        let request_id = RequestId::new();
        sqlx::query(
            "INSERT INTO friend_requests (request_id, sender, recipient, create_time, message) \
             VALUES ($1, $2, $3, now(), $4)",
        )
        .bind(request_id.0)
        .bind(sender.as_str())
        .bind(recipient.as_str())
        .bind(message)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(request_id)
    }

    async fn accept_request(
        &self,
        request_id: RequestId,
        acceptor: &Identity,
    ) -> Result<(ConversationId, Identity)> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT sender, recipient FROM friend_requests WHERE request_id = $1")
            .bind(request_id.0)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(GatewayError::NotFound)?;
        let sender: String = row.try_get("sender")?;
        let recipient: String = row.try_get("recipient")?;
        if recipient != acceptor.as_str() {
            return Err(GatewayError::PermissionDenied);
        }

        let conversation_id = ConversationId::new();
        let members_blob = serde_json::to_string(&[sender.clone(), recipient.clone()])?;
        sqlx::query("INSERT INTO conversations (conversation_id, members_blob) VALUES ($1, $2)")
            .bind(conversation_id.0)
            .bind(members_blob)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM friend_requests WHERE request_id = $1")
            .bind(request_id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((conversation_id, Identity::from(sender)))
    }

    async fn deny_request(&self, request_id: RequestId, denier: &Identity) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT recipient FROM friend_requests WHERE request_id = $1")
            .bind(request_id.0)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(GatewayError::NotFound)?;
        let recipient: String = row.try_get("recipient")?;
        if recipient != denier.as_str() {
            return Err(GatewayError::PermissionDenied);
        }
        sqlx::query("DELETE FROM friend_requests WHERE request_id = $1")
            .bind(request_id.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert_message(
        &self,
        author: &Identity,
        conversation_id: ConversationId,
        content: String,
        message_type: MessageType,
        gif_url: Option<String>,
        self_destruct_minutes: Option<i32>,
    ) -> Result<(MessageId, DateTime<Utc>)> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM conversations WHERE conversation_id = $1)")
                .bind(conversation_id.0)
                .fetch_one(&self.pool)
                .await?;
        if !exists {
            return Err(GatewayError::NotFound);
        }

        let message_id = MessageId::new();
        let type_str = match message_type {
            MessageType::Text => "TEXT",
            MessageType::Gif => "GIF",
        };
        let row = sqlx::query(
            "INSERT INTO messages \
             (message_id, author, content, conversation_id, self_destruct_minutes, \
              viewed, message_type, gif_url, send_time) \
             VALUES ($1, $2, $3, $4, $5, false, $6, $7, now()) RETURNING send_time",
        )
        .bind(message_id.0)
        .bind(author.as_str())
        .bind(&content)
        .bind(conversation_id.0)
        .bind(self_destruct_minutes)
        .bind(type_str)
        .bind(gif_url)
        .fetch_one(&self.pool)
        .await?;
        let send_time: DateTime<Utc> = row.try_get("send_time")?;
        Ok((message_id, send_time))
    }

    async fn get_messages_page(
        &self,
        conversation_id: ConversationId,
        offset: i64,
        viewer: &Identity,
    ) -> Result<(Vec<Message>, i64)> {
        let rows = sqlx::query(
            "SELECT message_id, author, content, conversation_id, self_destruct_minutes, \
             viewed, delete_time, message_type, gif_url, send_time FROM messages \
             WHERE conversation_id = $1 ORDER BY send_time DESC LIMIT 20 OFFSET $2",
        )
        .bind(conversation_id.0)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        let messages = rows.iter().map(Self::row_to_message).collect::<Result<Vec<_>>>()?;

        let unread_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = $1 AND author <> $2 \
             AND (viewed = false OR viewed IS NULL)",
        )
        .bind(conversation_id.0)
        .bind(viewer.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok((messages, unread_count))
    }

    async fn get_members(&self, conversation_id: ConversationId) -> Result<Conversation> {
        let row = sqlx::query("SELECT members_blob FROM conversations WHERE conversation_id = $1")
            .bind(conversation_id.0)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(GatewayError::NotFound)?;
        let members_blob: String = row.try_get("members_blob")?;
        let members: Vec<String> = serde_json::from_str(&members_blob)?;
        if members.len() != 2 {
            return Err(GatewayError::Storage("malformed members_blob".into()));
        }
        Ok(Conversation {
            conversation_id,
            members: (
                Identity::from(members[0].clone()),
                Identity::from(members[1].clone()),
            ),
        })
    }

    async fn remove_conversation(
        &self,
        conversation_id: ConversationId,
        requester: &Identity,
    ) -> Result<RemoveConversationOutcome> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT members_blob FROM conversations WHERE conversation_id = $1")
            .bind(conversation_id.0)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(RemoveConversationOutcome::NotFound);
        };
        let members_blob: String = row.try_get("members_blob")?;
        let members: Vec<String> = serde_json::from_str(&members_blob)?;
        if !members.iter().any(|m| m == requester.as_str()) {
            return Ok(RemoveConversationOutcome::NoPermission);
        }

        sqlx::query("DELETE FROM messages WHERE conversation_id = $1")
            .bind(conversation_id.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM conversations WHERE conversation_id = $1")
            .bind(conversation_id.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(RemoveConversationOutcome::Ok)
    }

    async fn mark_viewed_bulk(
        &self,
        author: &Identity,
        conversation_id: ConversationId,
        offset: i64,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query(
            "SELECT message_id, self_destruct_minutes, viewed FROM messages \
             WHERE conversation_id = $1 AND author = $2 \
             ORDER BY send_time DESC LIMIT 20 OFFSET $3 FOR UPDATE SKIP LOCKED",
        )
        .bind(conversation_id.0)
        .bind(author.as_str())
        .bind(offset)
        .fetch_all(&mut *tx)
        .await?;

        for row in rows {
            let message_id: uuid::Uuid = row.try_get("message_id")?;
            let already_viewed: bool = row.try_get("viewed")?;
            let self_destruct_minutes: Option<i32> = row.try_get("self_destruct_minutes")?;
            if already_viewed {
                continue;
            }
            if let Some(minutes) = self_destruct_minutes {
                sqlx::query(
                    "UPDATE messages SET viewed = true, \
                     delete_time = now() + make_interval(mins => $2) WHERE message_id = $1",
                )
                .bind(message_id)
                .bind(minutes)
                .execute(&mut *tx)
                .await?;
            } else {
                sqlx::query("UPDATE messages SET viewed = true WHERE message_id = $1")
                    .bind(message_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn mark_viewed_single(&self, message_id: MessageId) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            "SELECT self_destruct_minutes, viewed FROM messages WHERE message_id = $1 FOR UPDATE",
        )
        .bind(message_id.0)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(GatewayError::NotFound)?;
        let already_viewed: bool = row.try_get("viewed")?;
        if already_viewed {
            return Ok(());
        }
        let self_destruct_minutes: Option<i32> = row.try_get("self_destruct_minutes")?;
        if let Some(minutes) = self_destruct_minutes {
            sqlx::query(
                "UPDATE messages SET viewed = true, \
                 delete_time = now() + make_interval(mins => $2) WHERE message_id = $1",
            )
            .bind(message_id.0)
            .bind(minutes)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query("UPDATE messages SET viewed = true WHERE message_id = $1")
                .bind(message_id.0)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_expired_messages(&self) -> Result<Vec<ExpiredMessage>> {
        let rows = sqlx::query(
            "SELECT conversation_id, message_id FROM messages \
             WHERE viewed = true AND self_destruct_minutes IS NOT NULL AND delete_time <= now()",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                Ok(ExpiredMessage {
                    conversation_id: ConversationId(row.try_get("conversation_id")?),
                    message_id: MessageId(row.try_get("message_id")?),
                })
            })
            .collect()
    }

    async fn delete_expired_messages(&self) -> Result<()> {
        sqlx::query(
            "DELETE FROM messages WHERE viewed = true AND self_destruct_minutes IS NOT NULL \
             AND delete_time <= now()",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_message(&self, message_id: MessageId) -> Result<Option<Message>> {
        let row = sqlx::query(
            "SELECT message_id, author, content, conversation_id, self_destruct_minutes, \
             viewed, delete_time, message_type, gif_url, send_time FROM messages \
             WHERE message_id = $1",
        )
        .bind(message_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_message).transpose()
    }

    async fn add_push_token(&self, push_token: String, identity: &Identity) -> Result<()> {
        sqlx::query(
            "INSERT INTO push_notifications (push_token, account, expires) \
             VALUES ($1, $2, now() + interval '30 days') \
             ON CONFLICT (push_token) DO UPDATE SET expires = now() + interval '30 days', account = $2",
        )
        .bind(&push_token)
        .bind(identity.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_push_token(&self, push_token: &str) -> Result<()> {
        sqlx::query("DELETE FROM push_notifications WHERE push_token = $1")
            .bind(push_token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_push_tokens(&self, identity: &Identity) -> Result<Vec<PushRegistration>> {
        let rows = sqlx::query("SELECT push_token, account, expires FROM push_notifications WHERE account = $1")
            .bind(identity.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                Ok(PushRegistration {
                    push_token: row.try_get("push_token")?,
                    identity: Identity(row.try_get("account")?),
                    expires_at: row.try_get("expires")?,
                })
            })
            .collect()
    }

    async fn search_users(&self, query: &str) -> Result<Vec<Identity>> {
        let rows = sqlx::query(
            "SELECT account FROM users WHERE soundex(account) = soundex($1) LIMIT 25",
        )
        .bind(query)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| Ok(Identity(row.try_get("account")?)))
            .collect()
    }
}

impl PostgresGateway {
    fn row_to_request(row: &sqlx::postgres::PgRow) -> Result<FriendRequest> {
        Ok(FriendRequest {
            request_id: RequestId(row.try_get("request_id")?),
            sender: Identity(row.try_get("sender")?),
            recipient: Identity(row.try_get("recipient")?),
            created_at: row.try_get("create_time")?,
            message: row.try_get("message")?,
        })
    }
}
