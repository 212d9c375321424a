// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

mod common;

use actix::prelude::*;

use twochat_server::domain::Identity;
use twochat_server::session::{Connect, Disconnect, IsPresent, SessionHandleId, SessionRegistry};

use common::spawn_capture;

/// Invariant 2: presence(u) iff at least one attached handle has identity u.
#[actix_rt::test]
async fn presence_tracks_attached_handles() {
    let registry = SessionRegistry::new().start();
    let alice = Identity::from("alice");

    assert!(!registry.send(IsPresent(alice.clone())).await.unwrap());

    let (addr, _rx) = spawn_capture();
    let handle = SessionHandleId::new();
    let became_present = registry
        .send(Connect {
            identity: alice.clone(),
            handle_id: handle,
            recipient: addr.recipient(),
        })
        .await
        .unwrap();
    assert!(became_present);
    assert!(registry.send(IsPresent(alice.clone())).await.unwrap());

    let became_absent = registry
        .send(Disconnect {
            identity: alice.clone(),
            handle_id: handle,
        })
        .await
        .unwrap();
    assert!(became_absent);
    assert!(!registry.send(IsPresent(alice)).await.unwrap());
}

/// Scenario 5: a second session for the same identity does not re-trigger
/// "became present"; closing one of two sessions does not report "became
/// absent"; closing the last one does.
#[actix_rt::test]
async fn multi_device_presence_transitions_once() {
    let registry = SessionRegistry::new().start();
    let alice = Identity::from("alice");

    let (addr1, _rx1) = spawn_capture();
    let (addr2, _rx2) = spawn_capture();
    let handle1 = SessionHandleId::new();
    let handle2 = SessionHandleId::new();

    let first_connect = registry
        .send(Connect {
            identity: alice.clone(),
            handle_id: handle1,
            recipient: addr1.recipient(),
        })
        .await
        .unwrap();
    assert!(first_connect, "first session should flip presence on");

    let second_connect = registry
        .send(Connect {
            identity: alice.clone(),
            handle_id: handle2,
            recipient: addr2.recipient(),
        })
        .await
        .unwrap();
    assert!(
        !second_connect,
        "a second session for an already-present identity must not report a transition"
    );

    let first_disconnect = registry
        .send(Disconnect {
            identity: alice.clone(),
            handle_id: handle1,
        })
        .await
        .unwrap();
    assert!(
        !first_disconnect,
        "one of two sessions closing must not report a transition"
    );
    assert!(registry.send(IsPresent(alice.clone())).await.unwrap());

    let second_disconnect = registry
        .send(Disconnect {
            identity: alice.clone(),
            handle_id: handle2,
        })
        .await
        .unwrap();
    assert!(
        second_disconnect,
        "the last session closing must report a transition to absent"
    );
    assert!(!registry.send(IsPresent(alice)).await.unwrap());
}
