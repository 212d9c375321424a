// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Core data model shared by every component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque, printable identity. The core neither mints nor validates these
/// beyond string equality; creation and credential issuance live outside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

macro_rules! uuid_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_newtype!(ConversationId);
uuid_newtype!(MessageId);
uuid_newtype!(RequestId);

/// Message content kind. Closed set per the protocol: plain text or a GIF
/// attachment, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    Text,
    Gif,
}

impl Default for MessageType {
    fn default() -> Self {
        MessageType::Text
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
    pub author: Identity,
    pub content: String,
    pub message_type: MessageType,
    pub gif_url: Option<String>,
    pub self_destruct_minutes: Option<i32>,
    pub send_time: DateTime<Utc>,
    pub viewed: bool,
    pub delete_time: Option<DateTime<Utc>>,
}

impl Message {
    /// A message past its deadline, once viewed, is eligible for the
    /// scheduler sweep. See `spec.md` §3's Message invariants.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.self_destruct_minutes.is_some() && self.viewed && matches!(self.delete_time, Some(t) if t <= now)
    }
}

/// A two-member conversation. Immutable except for explicit removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: ConversationId,
    pub members: (Identity, Identity),
}

impl Conversation {
    pub fn members_vec(&self) -> Vec<Identity> {
        vec![self.members.0.clone(), self.members.1.clone()]
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        &self.members.0 == identity || &self.members.1 == identity
    }

    pub fn other(&self, identity: &Identity) -> Option<Identity> {
        if &self.members.0 == identity {
            Some(self.members.1.clone())
        } else if &self.members.1 == identity {
            Some(self.members.0.clone())
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequest {
    pub request_id: RequestId,
    pub sender: Identity,
    pub recipient: Identity,
    pub created_at: DateTime<Utc>,
    pub message: Option<String>,
}

/// A row of `get_friends`: the friend, their shared conversation, and the
/// viewer's own unread count in that conversation. `online` is not known to
/// the persistence gateway; the endpoint layer fills it in from the
/// [`crate::session::SessionRegistry`] after loading this row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendSummary {
    pub friend: Identity,
    pub conversation_id: ConversationId,
    pub unread_count: i64,
    pub last_message_preview: Option<String>,
    pub online: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRegistration {
    pub push_token: String,
    pub identity: Identity,
    pub expires_at: DateTime<Utc>,
}
