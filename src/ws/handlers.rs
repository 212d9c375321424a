// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The closed dispatch table for `SEND_MESSAGE`, `VIEW_MESSAGE`,
//! `USER_TYPING`. `spec.md` §4.4. Each handler is given the capability
//! bundle `{registry, gateway, push, identity}` per §9's design note and
//! produces exactly one [`ResponseFrame`], emitting events as a side
//! effect only on the success path.

use std::collections::HashSet;
use std::sync::Arc;

use actix::prelude::*;
use serde::Deserialize;
use serde_json::json;

use crate::domain::{ConversationId, Identity, MessageId, MessageType};
use crate::push::{self, PushDispatcher};
use crate::session::{Broadcast, SessionRegistry};
use crate::storage::PersistenceGateway;

use super::{EventFrame, ResponseFrame};

pub struct HandlerContext<G, P> {
    pub gateway: Arc<G>,
    pub registry: Addr<SessionRegistry>,
    pub push: Arc<P>,
    pub identity: Identity,
}

impl<G, P> Clone for HandlerContext<G, P> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            registry: self.registry.clone(),
            push: self.push.clone(),
            identity: self.identity.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendMessageBody {
    #[serde(rename = "conversationId")]
    conversation_id: String,
    text: String,
    #[serde(rename = "messageType")]
    message_type: Option<String>,
    #[serde(rename = "gifURL")]
    gif_url: Option<String>,
    #[serde(rename = "selfDestructMinutes")]
    self_destruct_minutes: Option<i32>,
}

pub async fn handle_send_message<G, P>(
    ctx: &HandlerContext<G, P>,
    request_id: &str,
    body: serde_json::Value,
) -> ResponseFrame
where
    G: PersistenceGateway,
    P: PushDispatcher,
{
    let body: SendMessageBody = match serde_json::from_value(body) {
        Ok(b) => b,
        Err(e) => return ResponseFrame::new(request_id, 400).with_message(e.to_string()),
    };

    if let Some(message_type) = &body.message_type {
        if message_type != "GIF" {
            return ResponseFrame::new(request_id, 400).with_message("Invalid message type.");
        }
    }

    let conversation_id: ConversationId = match body.conversation_id.parse() {
        Ok(id) => id,
        Err(_) => return ResponseFrame::new(request_id, 400).with_message("invalid conversationId"),
    };

    let conversation = match ctx.gateway.get_members(conversation_id).await {
        Ok(c) => c,
        Err(_) => return ResponseFrame::new(request_id, 404).with_message("Conversation not found!"),
    };
    if !conversation.contains(&ctx.identity) {
        return ResponseFrame::new(request_id, 403)
            .with_message("You are not a member of this conversation.");
    }

    let message_type = if body.message_type.is_some() {
        MessageType::Gif
    } else {
        MessageType::Text
    };

    let (message_id, send_time) = match ctx
        .gateway
        .insert_message(
            &ctx.identity,
            conversation_id,
            body.text.clone(),
            message_type,
            body.gif_url.clone(),
            body.self_destruct_minutes,
        )
        .await
    {
        Ok(r) => r,
        Err(_) => return ResponseFrame::new(request_id, 404).with_message("Conversation not found!"),
    };

    let response = ResponseFrame::new(request_id, 200).with_message("Message send!");

    let recipients: Vec<Identity> = conversation
        .members_vec()
        .into_iter()
        .filter(|m| m != &ctx.identity)
        .collect();

    let event = EventFrame::new(
        "NEW_MESSAGE",
        json!({
            "conversationId": conversation_id.to_string(),
            "message": {
                "author": ctx.identity.as_str(),
                "text": body.text,
                "id": message_id.to_string(),
                "type": if message_type == MessageType::Gif { "GIF" } else { "TEXT" },
                "gifURL": body.gif_url,
                "sendTime": send_time,
            }
        }),
    );
    let payload = serde_json::to_string(&event).unwrap_or_default();
    ctx.registry.do_send(Broadcast {
        targets: recipients.iter().cloned().collect::<HashSet<_>>(),
        payload,
    });

    let presence = match ctx
        .registry
        .send(crate::session::PresenceOf(recipients.clone()))
        .await
    {
        Ok(p) => p,
        Err(_) => Vec::new(),
    };
    for (recipient, online) in presence {
        if online {
            continue;
        }
        let badge = ctx
            .gateway
            .get_friends(&recipient)
            .await
            .map(|friends| friends.iter().map(|f| f.unread_count).sum())
            .unwrap_or(0);
        push::fire_and_forget(
            ctx.push.clone(),
            ctx.identity.to_string(),
            body.text.clone(),
            json!({ "conversationId": conversation_id.to_string() }),
            recipient,
            badge,
        );
    }

    response
}

#[derive(Debug, Deserialize)]
struct ViewMessageBody {
    #[serde(rename = "conversationId")]
    conversation_id: String,
    #[serde(rename = "messageId")]
    message_id: String,
}

pub async fn handle_view_message<G, P>(
    ctx: &HandlerContext<G, P>,
    request_id: &str,
    body: serde_json::Value,
) -> ResponseFrame
where
    G: PersistenceGateway,
    P: PushDispatcher,
{
    let body: ViewMessageBody = match serde_json::from_value(body) {
        Ok(b) => b,
        Err(e) => return ResponseFrame::new(request_id, 400).with_message(e.to_string()),
    };

    let conversation_id: ConversationId = match body.conversation_id.parse() {
        Ok(id) => id,
        Err(_) => return ResponseFrame::new(request_id, 400).with_message("invalid conversationId"),
    };
    let message_id: MessageId = match body.message_id.parse() {
        Ok(id) => id,
        Err(_) => return ResponseFrame::new(request_id, 400).with_message("invalid messageId"),
    };

    let conversation = match ctx.gateway.get_members(conversation_id).await {
        Ok(c) => c,
        Err(_) => return ResponseFrame::new(request_id, 404).with_message("Conversation not found"),
    };
    if !conversation.contains(&ctx.identity) {
        return ResponseFrame::new(request_id, 403)
            .with_message("You are not a member of this conversation");
    }

    let message = match ctx.gateway.get_message(message_id).await {
        Ok(Some(m)) => m,
        _ => return ResponseFrame::new(request_id, 404).with_message("Message not found in this conversation"),
    };
    if message.conversation_id != conversation_id {
        return ResponseFrame::new(request_id, 404).with_message("Message not found in this conversation");
    }
    if message.author == ctx.identity {
        return ResponseFrame::new(request_id, 403).with_message("You cannot view your own message");
    }

    if ctx.gateway.mark_viewed_single(message_id).await.is_err() {
        return ResponseFrame::new(request_id, 404).with_message("Message not found in this conversation");
    }

    ResponseFrame::new(request_id, 200).with_message("Message marked as viewed")
}

#[derive(Debug, Deserialize)]
struct UserTypingBody {
    #[serde(rename = "conversationId")]
    conversation_id: String,
    #[serde(rename = "isTyping")]
    is_typing: bool,
}

pub async fn handle_user_typing<G, P>(
    ctx: &HandlerContext<G, P>,
    request_id: &str,
    body: serde_json::Value,
) -> ResponseFrame
where
    G: PersistenceGateway,
    P: PushDispatcher,
{
    let body: UserTypingBody = match serde_json::from_value(body) {
        Ok(b) => b,
        Err(e) => return ResponseFrame::new(request_id, 400).with_message(e.to_string()),
    };

    let conversation_id: ConversationId = match body.conversation_id.parse() {
        Ok(id) => id,
        Err(_) => return ResponseFrame::new(request_id, 400).with_message("invalid conversationId"),
    };

    let conversation = match ctx.gateway.get_members(conversation_id).await {
        Ok(c) => c,
        Err(_) => return ResponseFrame::new(request_id, 404).with_message("Conversation not found."),
    };
    if !conversation.contains(&ctx.identity) {
        return ResponseFrame::new(request_id, 403)
            .with_message("You are not a member of this conversation.");
    }

    let targets: HashSet<Identity> = conversation
        .members_vec()
        .into_iter()
        .filter(|m| m != &ctx.identity)
        .collect();

    let event = EventFrame::new(
        "USER_TYPING",
        json!({
            "conversationId": conversation_id.to_string(),
            "user": ctx.identity.as_str(),
            "isTyping": body.is_typing,
        }),
    );
    ctx.registry.do_send(Broadcast {
        targets,
        payload: serde_json::to_string(&event).unwrap_or_default(),
    });

    ResponseFrame::new(request_id, 200)
}
