// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::Arc;
use std::time::Duration;

use actix::prelude::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use twochat_server::domain::{
    Conversation, ConversationId, FriendRequest, FriendSummary, Identity, Message, MessageId,
    MessageType, PushRegistration, RequestId,
};
use twochat_server::errors::{GatewayError, PushError};
use twochat_server::push::PushDispatcher;
use twochat_server::storage::memory::MemoryGateway;
use twochat_server::storage::{ExpiredMessage, PersistenceGateway, RemoveConversationOutcome};

/// A session handle that forwards every [`ServerEvent`] it receives onto an
/// unbounded channel the test can poll, standing in for a real WebSocket
/// connection actor.
pub struct Capture {
    tx: mpsc::UnboundedSender<String>,
}

impl Actor for Capture {
    type Context = Context<Self>;
}

impl Handler<twochat_server::session::ServerEvent> for Capture {
    type Result = ();

    fn handle(&mut self, msg: twochat_server::session::ServerEvent, _ctx: &mut Self::Context) {
        let _ = self.tx.send(msg.0);
    }
}

pub fn spawn_capture() -> (Addr<Capture>, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Capture { tx }.start(), rx)
}

/// Push dispatcher that does nothing; most tests don't exercise the push path.
#[derive(Default)]
pub struct NoopPush;

#[async_trait]
impl PushDispatcher for NoopPush {
    async fn dispatch(
        &self,
        _title: &str,
        _body: &str,
        _data: serde_json::Value,
        _identity: &Identity,
        _badge: i64,
    ) -> Result<(), PushError> {
        Ok(())
    }
}

/// Wraps a gateway and delays `insert_message` by a fixed duration before
/// delegating, so a test can arrange for one request's gateway round trip to
/// take visibly longer than another's.
pub struct SlowGateway<G> {
    pub inner: Arc<G>,
    pub insert_delay: Duration,
}

#[async_trait]
impl<G: PersistenceGateway> PersistenceGateway for SlowGateway<G> {
    async fn create_user_if_missing(&self, identity: &Identity) -> Result<(), GatewayError> {
        self.inner.create_user_if_missing(identity).await
    }

    async fn get_friends(&self, identity: &Identity) -> Result<Vec<FriendSummary>, GatewayError> {
        self.inner.get_friends(identity).await
    }

    async fn get_incoming_requests(&self, identity: &Identity) -> Result<Vec<FriendRequest>, GatewayError> {
        self.inner.get_incoming_requests(identity).await
    }

    async fn get_outgoing_requests(&self, identity: &Identity) -> Result<Vec<FriendRequest>, GatewayError> {
        self.inner.get_outgoing_requests(identity).await
    }

    async fn create_friend_request(
        &self,
        sender: &Identity,
        recipient: &Identity,
        message: Option<String>,
    ) -> Result<RequestId, GatewayError> {
        self.inner.create_friend_request(sender, recipient, message).await
    }

    async fn accept_request(
        &self,
        request_id: RequestId,
        acceptor: &Identity,
    ) -> Result<(ConversationId, Identity), GatewayError> {
        self.inner.accept_request(request_id, acceptor).await
    }

    async fn deny_request(&self, request_id: RequestId, denier: &Identity) -> Result<(), GatewayError> {
        self.inner.deny_request(request_id, denier).await
    }

    async fn insert_message(
        &self,
        author: &Identity,
        conversation_id: ConversationId,
        content: String,
        message_type: MessageType,
        gif_url: Option<String>,
        self_destruct_minutes: Option<i32>,
    ) -> Result<(MessageId, DateTime<Utc>), GatewayError> {
        tokio::time::sleep(self.insert_delay).await;
        self.inner
            .insert_message(author, conversation_id, content, message_type, gif_url, self_destruct_minutes)
            .await
    }

    async fn get_messages_page(
        &self,
        conversation_id: ConversationId,
        offset: i64,
        viewer: &Identity,
    ) -> Result<(Vec<Message>, i64), GatewayError> {
        self.inner.get_messages_page(conversation_id, offset, viewer).await
    }

    async fn get_members(&self, conversation_id: ConversationId) -> Result<Conversation, GatewayError> {
        self.inner.get_members(conversation_id).await
    }

    async fn remove_conversation(
        &self,
        conversation_id: ConversationId,
        requester: &Identity,
    ) -> Result<RemoveConversationOutcome, GatewayError> {
        self.inner.remove_conversation(conversation_id, requester).await
    }

    async fn mark_viewed_bulk(
        &self,
        author: &Identity,
        conversation_id: ConversationId,
        offset: i64,
    ) -> Result<(), GatewayError> {
        self.inner.mark_viewed_bulk(author, conversation_id, offset).await
    }

    async fn mark_viewed_single(&self, message_id: MessageId) -> Result<(), GatewayError> {
        self.inner.mark_viewed_single(message_id).await
    }

    async fn get_expired_messages(&self) -> Result<Vec<ExpiredMessage>, GatewayError> {
        self.inner.get_expired_messages().await
    }

    async fn delete_expired_messages(&self) -> Result<(), GatewayError> {
        self.inner.delete_expired_messages().await
    }

    async fn get_message(&self, message_id: MessageId) -> Result<Option<Message>, GatewayError> {
        self.inner.get_message(message_id).await
    }

    async fn add_push_token(&self, push_token: String, identity: &Identity) -> Result<(), GatewayError> {
        self.inner.add_push_token(push_token, identity).await
    }

    async fn remove_push_token(&self, push_token: &str) -> Result<(), GatewayError> {
        self.inner.remove_push_token(push_token).await
    }

    async fn get_push_tokens(&self, identity: &Identity) -> Result<Vec<PushRegistration>, GatewayError> {
        self.inner.get_push_tokens(identity).await
    }

    async fn search_users(&self, query: &str) -> Result<Vec<Identity>, GatewayError> {
        self.inner.search_users(query).await
    }
}

/// Creates `alice` and `bob`, friends each other, and returns their shared
/// conversation.
pub async fn alice_and_bob(gateway: &Arc<MemoryGateway>) -> (Identity, Identity, ConversationId) {
    let alice = Identity::from("alice");
    let bob = Identity::from("bob");
    gateway.create_user_if_missing(&alice).await.unwrap();
    gateway.create_user_if_missing(&bob).await.unwrap();

    let request_id = gateway
        .create_friend_request(&alice, &bob, None)
        .await
        .unwrap();
    let (conversation_id, sender) = gateway.accept_request(request_id, &bob).await.unwrap();
    assert_eq!(sender, alice);

    (alice, bob, conversation_id)
}
