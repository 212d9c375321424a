// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Destruct Scheduler: the singleton background sweep. `spec.md` §4.5.
//! Grounded on the teacher's long-lived `tokio::spawn` task idiom
//! (`main.rs`'s DB-connection retry loop uses the same sleep-and-retry
//! shape), generalized to a periodic tick with cooperative cancellation.

use std::sync::Arc;
use std::time::Duration;

use actix::Addr;
use tokio::sync::watch;

use crate::session::{Broadcast, SessionRegistry};
use crate::storage::PersistenceGateway;

const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Spawns the scheduler loop. Cancellation is cooperative at the interval
/// tick: the returned task exits as soon as `shutdown` fires.
pub fn spawn<G: PersistenceGateway>(
    gateway: Arc<G>,
    registry: Addr<SessionRegistry>,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    tick(&gateway, &registry).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("destruct scheduler shutting down");
                        break;
                    }
                }
            }
        }
    })
}

/// One sweep: notify, then delete. Errors are logged and swallowed; the
/// next tick retries. `spec.md` §4.5's ordering guarantee (notification
/// precedes deletion, idempotent on crash-recovery) falls directly out of
/// this being the only place either happens. Public so tests can drive a
/// sweep directly instead of waiting out [`SWEEP_INTERVAL`].
pub async fn tick<G: PersistenceGateway>(gateway: &Arc<G>, registry: &Addr<SessionRegistry>) {
    let expired = match gateway.get_expired_messages().await {
        Ok(e) => e,
        Err(err) => {
            tracing::warn!(error = %err, "destruct scheduler: failed to list expired messages");
            return;
        }
    };
    if expired.is_empty() {
        return;
    }

    for message in &expired {
        let members = match gateway.get_members(message.conversation_id).await {
            Ok(m) => m,
            Err(err) => {
                tracing::warn!(error = %err, conversation_id = %message.conversation_id, "destruct scheduler: conversation lookup failed");
                continue;
            }
        };
        let event = crate::ws::EventFrame::new(
            "DELETE_MESSAGE",
            serde_json::json!({
                "conversationId": message.conversation_id.to_string(),
                "messageId": message.message_id.to_string(),
            }),
        );
        registry.do_send(Broadcast {
            targets: members.members_vec().into_iter().collect(),
            payload: serde_json::to_string(&event).unwrap_or_default(),
        });
    }

    if let Err(err) = gateway.delete_expired_messages().await {
        tracing::warn!(error = %err, "destruct scheduler: failed to delete expired messages");
    }
}
