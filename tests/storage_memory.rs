// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

mod common;

use std::sync::Arc;

use twochat_server::domain::{Identity, MessageType};
use twochat_server::errors::GatewayError;
use twochat_server::storage::memory::MemoryGateway;
use twochat_server::storage::{PersistenceGateway, RemoveConversationOutcome};

use common::alice_and_bob;

/// Round-trip: send -> load. `load_messages` returns a message inserted by
/// `insert_message` with the same fields, and a `sendTime` no earlier than
/// the call.
#[actix_rt::test]
async fn send_then_load_round_trips() {
    let gateway = Arc::new(MemoryGateway::new());
    let (alice, bob, conversation_id) = alice_and_bob(&gateway).await;

    let before = chrono::Utc::now();
    let (message_id, send_time) = gateway
        .insert_message(
            &alice,
            conversation_id,
            "hi".into(),
            MessageType::Text,
            None,
            None,
        )
        .await
        .unwrap();
    assert!(send_time >= before);

    let (messages, unread_count) = gateway
        .get_messages_page(conversation_id, 0, &bob)
        .await
        .unwrap();
    assert_eq!(unread_count, 1);
    let message = messages.iter().find(|m| m.message_id == message_id).unwrap();
    assert_eq!(message.author, alice);
    assert_eq!(message.content, "hi");
    assert_eq!(message.send_time, send_time);
}

/// Round-trip: register -> get. `get_push_tokens` after `add_push_token`
/// contains the token.
#[actix_rt::test]
async fn register_then_get_push_token_round_trips() {
    let gateway = MemoryGateway::new();
    let alice = Identity::from("alice");
    gateway.create_user_if_missing(&alice).await.unwrap();

    gateway
        .add_push_token("token-123".into(), &alice)
        .await
        .unwrap();
    let tokens = gateway.get_push_tokens(&alice).await.unwrap();
    assert!(tokens.iter().any(|t| t.push_token == "token-123"));

    gateway.remove_push_token("token-123").await.unwrap();
    let tokens = gateway.get_push_tokens(&alice).await.unwrap();
    assert!(tokens.is_empty());
}

/// A friend request is visible to the recipient as incoming and to the
/// sender as outgoing; accepting it removes the request and creates a
/// two-member conversation.
#[actix_rt::test]
async fn friend_request_accept_creates_conversation() {
    let gateway = MemoryGateway::new();
    let alice = Identity::from("alice");
    let bob = Identity::from("bob");
    gateway.create_user_if_missing(&alice).await.unwrap();
    gateway.create_user_if_missing(&bob).await.unwrap();

    let request_id = gateway
        .create_friend_request(&alice, &bob, Some("hey".into()))
        .await
        .unwrap();

    let incoming = gateway.get_incoming_requests(&bob).await.unwrap();
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].request_id, request_id);
    let outgoing = gateway.get_outgoing_requests(&alice).await.unwrap();
    assert_eq!(outgoing.len(), 1);

    // Only the recipient may accept.
    let denied = gateway.accept_request(request_id, &alice).await;
    assert!(matches!(denied, Err(GatewayError::PermissionDenied)));

    let (conversation_id, sender) = gateway.accept_request(request_id, &bob).await.unwrap();
    assert_eq!(sender, alice);

    let conversation = gateway.get_members(conversation_id).await.unwrap();
    assert!(conversation.contains(&alice));
    assert!(conversation.contains(&bob));
    assert_eq!(conversation.other(&alice), Some(bob.clone()));

    assert!(gateway.get_incoming_requests(&bob).await.unwrap().is_empty());
}

/// A duplicate request to the same recipient is rejected, and a request to a
/// nonexistent account is rejected.
#[actix_rt::test]
async fn friend_request_rejects_duplicate_and_unknown_recipient() {
    let gateway = MemoryGateway::new();
    let alice = Identity::from("alice");
    let bob = Identity::from("bob");
    gateway.create_user_if_missing(&alice).await.unwrap();
    gateway.create_user_if_missing(&bob).await.unwrap();

    gateway
        .create_friend_request(&alice, &bob, None)
        .await
        .unwrap();
    let duplicate = gateway.create_friend_request(&alice, &bob, None).await;
    assert!(matches!(duplicate, Err(GatewayError::AlreadyExists)));

    let unknown = Identity::from("nobody");
    let missing = gateway.create_friend_request(&alice, &unknown, None).await;
    assert!(matches!(missing, Err(GatewayError::NotFound)));
}

/// Invariant 3: conversation members are immutable until removal; removal by
/// a non-member is rejected, removal by a member deletes the conversation
/// and its messages.
#[actix_rt::test]
async fn remove_conversation_requires_membership_and_cascades() {
    let gateway = Arc::new(MemoryGateway::new());
    let (alice, bob, conversation_id) = alice_and_bob(&gateway).await;
    gateway
        .insert_message(&alice, conversation_id, "hi".into(), MessageType::Text, None, None)
        .await
        .unwrap();

    let carol = Identity::from("carol");
    gateway.create_user_if_missing(&carol).await.unwrap();
    let outcome = gateway.remove_conversation(conversation_id, &carol).await.unwrap();
    assert_eq!(outcome, RemoveConversationOutcome::NoPermission);

    let outcome = gateway.remove_conversation(conversation_id, &bob).await.unwrap();
    assert_eq!(outcome, RemoveConversationOutcome::Ok);

    assert!(matches!(
        gateway.get_members(conversation_id).await,
        Err(GatewayError::NotFound)
    ));
    let friends = gateway.get_friends(&alice).await.unwrap();
    assert!(!friends.iter().any(|f| f.conversation_id == conversation_id));

    let again = gateway.remove_conversation(conversation_id, &bob).await.unwrap();
    assert_eq!(again, RemoveConversationOutcome::NotFound);
}
