// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

mod common;

use std::sync::Arc;
use std::time::Duration;

use actix::prelude::*;

use twochat_server::domain::MessageType;
use twochat_server::scheduler;
use twochat_server::session::{Connect, SessionHandleId, SessionRegistry};
use twochat_server::storage::memory::MemoryGateway;
use twochat_server::storage::PersistenceGateway;

use common::{alice_and_bob, spawn_capture};

/// Scenario 4: a self-destructing message is retrievable until viewed; once
/// viewed and past its deadline, the scheduler sweep deletes it and notifies
/// both members, and it no longer appears in `load_messages`.
#[actix_rt::test]
async fn self_destruct_lifecycle() {
    let gateway = Arc::new(MemoryGateway::new());
    let registry = SessionRegistry::new().start();
    let (alice, bob, conversation_id) = alice_and_bob(&gateway).await;

    let (alice_addr, mut alice_rx) = spawn_capture();
    let (bob_addr, mut bob_rx) = spawn_capture();
    registry
        .send(Connect {
            identity: alice.clone(),
            handle_id: SessionHandleId::new(),
            recipient: alice_addr.recipient(),
        })
        .await
        .unwrap();
    registry
        .send(Connect {
            identity: bob.clone(),
            handle_id: SessionHandleId::new(),
            recipient: bob_addr.recipient(),
        })
        .await
        .unwrap();

    let (message_id, _) = gateway
        .insert_message(
            &alice,
            conversation_id,
            "secret".into(),
            MessageType::Text,
            None,
            Some(1),
        )
        .await
        .unwrap();

    // Not viewed yet: a sweep must not touch it.
    scheduler::tick(&gateway, &registry).await;
    let (messages, _) = gateway
        .get_messages_page(conversation_id, 0, &bob)
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);

    gateway.mark_viewed_single(message_id).await.unwrap();
    let viewed = gateway.get_message(message_id).await.unwrap().unwrap();
    assert!(viewed.viewed);
    assert!(viewed.delete_time.is_some());

    // Immediately after viewing, the 1-minute deadline hasn't passed.
    scheduler::tick(&gateway, &registry).await;
    assert!(gateway.get_message(message_id).await.unwrap().is_some());

    // `MemoryGateway` has no time-travel hook, so instead of waiting out a
    // 1-minute deadline, insert a second message whose destruct window is
    // zero minutes: it expires the instant it's viewed.
    let (short_id, _) = gateway
        .insert_message(
            &alice,
            conversation_id,
            "short-lived".into(),
            MessageType::Text,
            None,
            Some(0),
        )
        .await
        .unwrap();
    gateway.mark_viewed_single(short_id).await.unwrap();

    scheduler::tick(&gateway, &registry).await;

    assert!(gateway.get_message(short_id).await.unwrap().is_none());
    let (messages_after, _) = gateway
        .get_messages_page(conversation_id, 0, &bob)
        .await
        .unwrap();
    assert!(!messages_after.iter().any(|m| m.message_id == short_id));

    let mut saw_delete_for_short = (false, false);
    for _ in 0..2 {
        if let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(200), alice_rx.recv()).await
        {
            if event.contains(&short_id.to_string()) {
                saw_delete_for_short.0 = true;
            }
        }
    }
    for _ in 0..2 {
        if let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(200), bob_rx.recv()).await
        {
            if event.contains(&short_id.to_string()) {
                saw_delete_for_short.1 = true;
            }
        }
    }
    assert!(
        saw_delete_for_short.0 && saw_delete_for_short.1,
        "both members should receive DELETE_MESSAGE for the expired message"
    );
}
