// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-memory [`PersistenceGateway`], used by tests and as a local-dev
//! fallback when no database is configured. Mirrors the teacher's
//! `MemStorageProvider`: `RwLock<HashMap<...>>` fields, lock-poisoning
//! mapped to `Storage`.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{
    Conversation, ConversationId, FriendRequest, FriendSummary, Identity, Message, MessageId,
    MessageType, PushRegistration, RequestId,
};
use crate::errors::GatewayError;

use super::{ExpiredMessage, PersistenceGateway, RemoveConversationOutcome, Result};

/// Standard Soundex code: one letter followed by three digits. Mirrors
/// Postgres's `fuzzystrmatch` `soundex()`, so `MemoryGateway` and
/// `PostgresGateway` agree on what "phonetic-similar" means. `spec.md` §4.1.
fn soundex(s: &str) -> String {
    fn code(c: char) -> Option<char> {
        match c.to_ascii_uppercase() {
            'B' | 'F' | 'P' | 'V' => Some('1'),
            'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => Some('2'),
            'D' | 'T' => Some('3'),
            'L' => Some('4'),
            'M' | 'N' => Some('5'),
            'R' => Some('6'),
            _ => None,
        }
    }

    let letters: Vec<char> = s.chars().filter(|c| c.is_ascii_alphabetic()).collect();
    let Some(&first) = letters.first() else {
        return String::new();
    };

    let mut out = String::new();
    out.push(first.to_ascii_uppercase());
    let mut last = code(first);
    for &c in &letters[1..] {
        let this = code(c);
        if let Some(digit) = this {
            if this != last {
                out.push(digit);
                if out.len() == 4 {
                    break;
                }
            }
        }
        if !matches!(c.to_ascii_uppercase(), 'H' | 'W') {
            last = this;
        }
    }
    while out.len() < 4 {
        out.push('0');
    }
    out
}

#[derive(Debug, Default)]
pub struct MemoryGateway {
    users: RwLock<Vec<Identity>>,
    friendships: RwLock<HashMap<Identity, Vec<(Identity, ConversationId)>>>,
    requests: RwLock<HashMap<RequestId, FriendRequest>>,
    conversations: RwLock<HashMap<ConversationId, Conversation>>,
    messages: RwLock<HashMap<MessageId, Message>>,
    push_tokens: RwLock<HashMap<String, PushRegistration>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn storage_err<T>(_: T) -> GatewayError {
        GatewayError::Storage("lock poisoned".into())
    }

    fn messages_for(&self, conversation_id: ConversationId) -> Vec<Message> {
        let messages = self.messages.read().unwrap();
        let mut v: Vec<Message> = messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        v.sort_by(|a, b| b.send_time.cmp(&a.send_time));
        v
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn create_user_if_missing(&self, identity: &Identity) -> Result<()> {
        let mut users = self.users.write().map_err(Self::storage_err)?;
        if !users.contains(identity) {
            users.push(identity.clone());
        }
        let mut friendships = self.friendships.write().map_err(Self::storage_err)?;
        friendships.entry(identity.clone()).or_default();
        Ok(())
    }

    async fn get_friends(&self, identity: &Identity) -> Result<Vec<FriendSummary>> {
        let friendships = self.friendships.read().map_err(Self::storage_err)?;
        let entries = friendships.get(identity).cloned().unwrap_or_default();
        let mut out = Vec::with_capacity(entries.len());
        for (friend, conversation_id) in entries {
            let messages = self.messages_for(conversation_id);
            let unread_count = messages
                .iter()
                .filter(|m| &m.author != identity && !m.viewed)
                .count() as i64;
            let last_message_preview = messages.first().map(|m| m.content.clone());
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
        let requests = self.requests.read().map_err(Self::storage_err)?;
        Ok(requests
            .values()
            .filter(|r| &r.recipient == identity)
            .cloned()
            .collect())
    }

    async fn get_outgoing_requests(&self, identity: &Identity) -> Result<Vec<FriendRequest>> {
        let requests = self.requests.read().map_err(Self::storage_err)?;
        Ok(requests
            .values()
            .filter(|r| &r.sender == identity)
            .cloned()
            .collect())
    }

    async fn create_friend_request(
        &self,
        sender: &Identity,
        recipient: &Identity,
        message: Option<String>,
    ) -> Result<RequestId> {
        {
            let users = self.users.read().map_err(Self::storage_err)?;
            if !users.contains(recipient) {
                return Err(GatewayError::NotFound);
            }
        }
        let mut requests = self.requests.write().map_err(Self::storage_err)?;
        if requests
            .values()
            .any(|r| &r.sender == sender && &r.recipient == recipient)
        {
            return Err(GatewayError::AlreadyExists);
        }
        let request_id = RequestId::new();
        requests.insert(
            request_id,
            FriendRequest {
                request_id,
                sender: sender.clone(),
                recipient: recipient.clone(),
                created_at: Utc::now(),
                message,
            },
        );
        Ok(request_id)
    }

    async fn accept_request(
        &self,
        request_id: RequestId,
        acceptor: &Identity,
    ) -> Result<(ConversationId, Identity)> {
        let request = {
            let mut requests = self.requests.write().map_err(Self::storage_err)?;
            let request = requests.get(&request_id).ok_or(GatewayError::NotFound)?;
            if &request.recipient != acceptor {
                return Err(GatewayError::PermissionDenied);
            }
            let request = request.clone();
            requests.remove(&request_id);
            request
        };

        let conversation_id = ConversationId::new();
        let conversation = Conversation {
            conversation_id,
            members: (request.sender.clone(), request.recipient.clone()),
        };
        self.conversations
            .write()
            .map_err(Self::storage_err)?
            .insert(conversation_id, conversation);

        let mut friendships = self.friendships.write().map_err(Self::storage_err)?;
        friendships
            .entry(request.sender.clone())
            .or_default()
            .push((request.recipient.clone(), conversation_id));
        friendships
            .entry(request.recipient.clone())
            .or_default()
            .push((request.sender.clone(), conversation_id));

        Ok((conversation_id, request.sender))
    }

    async fn deny_request(&self, request_id: RequestId, denier: &Identity) -> Result<()> {
        let mut requests = self.requests.write().map_err(Self::storage_err)?;
        let request = requests.get(&request_id).ok_or(GatewayError::NotFound)?;
        if &request.recipient != denier {
            return Err(GatewayError::PermissionDenied);
        }
        requests.remove(&request_id);
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
    ) -> Result<(MessageId, chrono::DateTime<Utc>)> {
        {
            let conversations = self.conversations.read().map_err(Self::storage_err)?;
            if !conversations.contains_key(&conversation_id) {
                return Err(GatewayError::NotFound);
            }
        }
        let message_id = MessageId::new();
        let send_time = Utc::now();
        let message = Message {
            message_id,
            conversation_id,
            author: author.clone(),
            content,
            message_type,
            gif_url,
            self_destruct_minutes,
            send_time,
            viewed: false,
            delete_time: None,
        };
        self.messages
            .write()
            .map_err(Self::storage_err)?
            .insert(message_id, message);
        Ok((message_id, send_time))
    }

    async fn get_messages_page(
        &self,
        conversation_id: ConversationId,
        offset: i64,
        viewer: &Identity,
    ) -> Result<(Vec<Message>, i64)> {
        let all = self.messages_for(conversation_id);
        let unread_count = all
            .iter()
            .filter(|m| &m.author != viewer && !m.viewed)
            .count() as i64;
        let start = offset.max(0) as usize;
        let page = all.into_iter().skip(start).take(20).collect();
        Ok((page, unread_count))
    }

    async fn get_members(&self, conversation_id: ConversationId) -> Result<Conversation> {
        let conversations = self.conversations.read().map_err(Self::storage_err)?;
        conversations
            .get(&conversation_id)
            .cloned()
            .ok_or(GatewayError::NotFound)
    }

    async fn remove_conversation(
        &self,
        conversation_id: ConversationId,
        requester: &Identity,
    ) -> Result<RemoveConversationOutcome> {
        let conversation = {
            let conversations = self.conversations.read().map_err(Self::storage_err)?;
            match conversations.get(&conversation_id) {
                Some(c) => c.clone(),
                None => return Ok(RemoveConversationOutcome::NotFound),
            }
        };
        if !conversation.contains(requester) {
            return Ok(RemoveConversationOutcome::NoPermission);
        }

        self.conversations
            .write()
            .map_err(Self::storage_err)?
            .remove(&conversation_id);
        self.messages
            .write()
            .map_err(Self::storage_err)?
            .retain(|_, m| m.conversation_id != conversation_id);

        let mut friendships = self.friendships.write().map_err(Self::storage_err)?;
        for identity in [&conversation.members.0, &conversation.members.1] {
            if let Some(list) = friendships.get_mut(identity) {
                list.retain(|(_, cid)| *cid != conversation_id);
            }
        }
        Ok(RemoveConversationOutcome::Ok)
    }

    async fn mark_viewed_bulk(
        &self,
        author: &Identity,
        conversation_id: ConversationId,
        offset: i64,
    ) -> Result<()> {
        let now = Utc::now();
        let mut ids: Vec<MessageId> = self
            .messages_for(conversation_id)
            .into_iter()
            .filter(|m| &m.author == author)
            .skip(offset.max(0) as usize)
            .take(20)
            .map(|m| m.message_id)
            .collect();
        ids.sort_by_key(|id| id.0);
        let mut messages = self.messages.write().map_err(Self::storage_err)?;
        for id in ids {
            if let Some(message) = messages.get_mut(&id) {
                if !message.viewed {
                    message.viewed = true;
                    if let Some(minutes) = message.self_destruct_minutes {
                        message.delete_time = Some(now + chrono::Duration::minutes(minutes as i64));
                    }
                }
            }
        }
        Ok(())
    }

    async fn mark_viewed_single(&self, message_id: MessageId) -> Result<()> {
        let now = Utc::now();
        let mut messages = self.messages.write().map_err(Self::storage_err)?;
        let message = messages.get_mut(&message_id).ok_or(GatewayError::NotFound)?;
        if !message.viewed {
            message.viewed = true;
            if let Some(minutes) = message.self_destruct_minutes {
                message.delete_time = Some(now + chrono::Duration::minutes(minutes as i64));
            }
        }
        Ok(())
    }

    async fn get_expired_messages(&self) -> Result<Vec<ExpiredMessage>> {
        let now = Utc::now();
        let messages = self.messages.read().map_err(Self::storage_err)?;
        Ok(messages
            .values()
            .filter(|m| m.is_expired(now))
            .map(|m| ExpiredMessage {
                conversation_id: m.conversation_id,
                message_id: m.message_id,
            })
            .collect())
    }

    async fn delete_expired_messages(&self) -> Result<()> {
        let now = Utc::now();
        let mut messages = self.messages.write().map_err(Self::storage_err)?;
        messages.retain(|_, m| !m.is_expired(now));
        Ok(())
    }

    async fn get_message(&self, message_id: MessageId) -> Result<Option<Message>> {
        let messages = self.messages.read().map_err(Self::storage_err)?;
        Ok(messages.get(&message_id).cloned())
    }

    async fn add_push_token(&self, push_token: String, identity: &Identity) -> Result<()> {
        let mut tokens = self.push_tokens.write().map_err(Self::storage_err)?;
        tokens.insert(
            push_token.clone(),
            PushRegistration {
                push_token,
                identity: identity.clone(),
                expires_at: Utc::now() + chrono::Duration::days(30),
            },
        );
        Ok(())
    }

    async fn remove_push_token(&self, push_token: &str) -> Result<()> {
        let mut tokens = self.push_tokens.write().map_err(Self::storage_err)?;
        tokens.remove(push_token);
        Ok(())
    }

    async fn get_push_tokens(&self, identity: &Identity) -> Result<Vec<PushRegistration>> {
        let tokens = self.push_tokens.read().map_err(Self::storage_err)?;
        Ok(tokens
            .values()
            .filter(|t| &t.identity == identity)
            .cloned()
            .collect())
    }

    async fn search_users(&self, query: &str) -> Result<Vec<Identity>> {
        let users = self.users.read().map_err(Self::storage_err)?;
        let query_code = soundex(query);
        Ok(users
            .iter()
            .filter(|u| soundex(u.as_str()) == query_code)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod soundex_tests {
    use super::soundex;

    #[test]
    fn classic_robert_rupert_match() {
        assert_eq!(soundex("Robert"), soundex("Rupert"));
        assert_eq!(soundex("Robert"), "R163");
    }

    #[test]
    fn dissimilar_names_diverge() {
        assert_ne!(soundex("alice"), soundex("bob"));
    }
}
