// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session & Presence Registry. `spec.md` §4.3. Grounded on the teacher's
//! `endpoints::qs::ws::dispatch::Dispatch` actor: registry mutation is
//! serialized through an actix actor's mailbox rather than a manual lock,
//! generalized from one handle per identity to many (multi-device).

use std::collections::{HashMap, HashSet};

use actix::prelude::*;
use uuid::Uuid;

use crate::domain::Identity;

/// An outbound frame pushed to one session. Delivery is best-effort: a send
/// on a broken handle is treated as an implicit detach, never as a registry
/// error.
#[derive(Message, Clone, Debug)]
#[rtype(result = "()")]
pub struct ServerEvent(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Copy)]
pub struct SessionHandleId(pub Uuid);

impl SessionHandleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionHandleId {
    fn default() -> Self {
        Self::new()
    }
}

/// Attach a handle. Returns whether the identity transitioned from absent
/// to present (caller broadcasts `PRESENCE_CHANGE` on `true`).
#[derive(Message)]
#[rtype(result = "bool")]
pub struct Connect {
    pub identity: Identity,
    pub handle_id: SessionHandleId,
    pub recipient: Recipient<ServerEvent>,
}

/// Detach a handle. Returns whether this was the last handle for the
/// identity (caller broadcasts `PRESENCE_CHANGE(offline)` on `true`).
#[derive(Message)]
#[rtype(result = "bool")]
pub struct Disconnect {
    pub identity: Identity,
    pub handle_id: SessionHandleId,
}

#[derive(Message)]
#[rtype(result = "bool")]
pub struct IsPresent(pub Identity);

#[derive(Message)]
#[rtype(result = "Vec<(Identity, bool)>")]
pub struct PresenceOf(pub Vec<Identity>);

/// Sends `payload` once per handle whose identity is in `targets`.
/// Deduplication key is the handle, not the identity — a two-device user
/// receives the payload on both.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Broadcast {
    pub targets: HashSet<Identity>,
    pub payload: String,
}

#[derive(Default)]
pub struct SessionRegistry {
    handles: HashMap<Identity, HashMap<SessionHandleId, Recipient<ServerEvent>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Actor for SessionRegistry {
    type Context = Context<Self>;
}

impl Handler<Connect> for SessionRegistry {
    type Result = bool;

    fn handle(&mut self, msg: Connect, _ctx: &mut Self::Context) -> Self::Result {
        let entry = self.handles.entry(msg.identity);
        let was_absent = matches!(entry, std::collections::hash_map::Entry::Vacant(_));
        entry.or_default().insert(msg.handle_id, msg.recipient);
        was_absent
    }
}

impl Handler<Disconnect> for SessionRegistry {
    type Result = bool;

    fn handle(&mut self, msg: Disconnect, _ctx: &mut Self::Context) -> Self::Result {
        let Some(handles) = self.handles.get_mut(&msg.identity) else {
            return false;
        };
        handles.remove(&msg.handle_id);
        if handles.is_empty() {
            self.handles.remove(&msg.identity);
            true
        } else {
            false
        }
    }
}

impl Handler<IsPresent> for SessionRegistry {
    type Result = bool;

    fn handle(&mut self, msg: IsPresent, _ctx: &mut Self::Context) -> Self::Result {
        self.handles
            .get(&msg.0)
            .map(|h| !h.is_empty())
            .unwrap_or(false)
    }
}

impl Handler<PresenceOf> for SessionRegistry {
    type Result = Vec<(Identity, bool)>;

    fn handle(&mut self, msg: PresenceOf, _ctx: &mut Self::Context) -> Self::Result {
        msg.0
            .into_iter()
            .map(|identity| {
                let online = self
                    .handles
                    .get(&identity)
                    .map(|h| !h.is_empty())
                    .unwrap_or(false);
                (identity, online)
            })
            .collect()
    }
}

impl Handler<Broadcast> for SessionRegistry {
    type Result = ();

    fn handle(&mut self, msg: Broadcast, _ctx: &mut Self::Context) -> Self::Result {
        for identity in &msg.targets {
            let Some(handles) = self.handles.get(identity) else {
                continue;
            };
            for recipient in handles.values() {
                // A broken mailbox is an implicit detach; the session actor
                // on the other end will notice the closed connection and
                // send its own `Disconnect` on drop. We never retry here.
                let _ = recipient.do_send(ServerEvent(msg.payload.clone()));
            }
        }
    }
}
