// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Persistence Gateway: synchronous (from the caller's point of view) access
//! to the durable store. `spec.md` §4.1.
//!
//! Two implementations share the trait: [`postgres::PostgresGateway`] for
//! production, [`memory::MemoryGateway`] for tests and local development,
//! mirroring the teacher's `storage_provider::{postgres, memory}` split.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Conversation, ConversationId, FriendRequest, FriendSummary, Message, MessageType,
    Identity, PushRegistration, RequestId,
};
use crate::errors::GatewayError;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// `remove_conversation` outcome; modeled as an enum rather than a bare
/// `Result` because "no permission" and "not found" both surface as plain
/// members of the closed error set but the caller needs to distinguish them
/// from the generic not-found of a missing identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveConversationOutcome {
    Ok,
    NoPermission,
    NotFound,
}

#[derive(Debug, Clone, Copy)]
pub struct ExpiredMessage {
    pub conversation_id: ConversationId,
    pub message_id: crate::domain::MessageId,
}

#[async_trait]
pub trait PersistenceGateway: Send + Sync + 'static {
    async fn create_user_if_missing(&self, identity: &Identity) -> Result<()>;

    async fn get_friends(&self, identity: &Identity) -> Result<Vec<FriendSummary>>;

    async fn get_incoming_requests(&self, identity: &Identity) -> Result<Vec<FriendRequest>>;

    async fn get_outgoing_requests(&self, identity: &Identity) -> Result<Vec<FriendRequest>>;

    async fn create_friend_request(
        &self,
        sender: &Identity,
        recipient: &Identity,
        message: Option<String>,
    ) -> Result<RequestId>;

    async fn accept_request(
        &self,
        request_id: RequestId,
        acceptor: &Identity,
    ) -> Result<(ConversationId, Identity)>;

    async fn deny_request(&self, request_id: RequestId, denier: &Identity) -> Result<()>;

    #[allow(clippy::too_many_arguments)]
    async fn insert_message(
        &self,
        author: &Identity,
        conversation_id: ConversationId,
        content: String,
        message_type: MessageType,
        gif_url: Option<String>,
        self_destruct_minutes: Option<i32>,
    ) -> Result<(crate::domain::MessageId, DateTime<Utc>)>;

    async fn get_messages_page(
        &self,
        conversation_id: ConversationId,
        offset: i64,
        viewer: &Identity,
    ) -> Result<(Vec<Message>, i64)>;

    async fn get_members(&self, conversation_id: ConversationId) -> Result<Conversation>;

    async fn remove_conversation(
        &self,
        conversation_id: ConversationId,
        requester: &Identity,
    ) -> Result<RemoveConversationOutcome>;

    async fn mark_viewed_bulk(
        &self,
        author: &Identity,
        conversation_id: ConversationId,
        offset: i64,
    ) -> Result<()>;

    async fn mark_viewed_single(&self, message_id: crate::domain::MessageId) -> Result<()>;

    async fn get_expired_messages(&self) -> Result<Vec<ExpiredMessage>>;

    async fn delete_expired_messages(&self) -> Result<()>;

    async fn get_message(&self, message_id: crate::domain::MessageId) -> Result<Option<Message>>;

    async fn add_push_token(&self, push_token: String, identity: &Identity) -> Result<()>;

    async fn remove_push_token(&self, push_token: &str) -> Result<()>;

    async fn get_push_tokens(&self, identity: &Identity) -> Result<Vec<PushRegistration>>;

    async fn search_users(&self, query: &str) -> Result<Vec<Identity>>;
}
