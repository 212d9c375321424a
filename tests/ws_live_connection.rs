// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Drives `LiveUpdateConnection` end to end through a real `ws::start`
//! upgrade, rather than calling the handler functions directly. `spec.md`
//! §5's response-ordering invariant is a property of the actor's dispatch
//! loop, not of any one handler, so it can only be demonstrated by putting
//! two frames on the wire back to back.

mod common;

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use actix::Actor;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use twochat_server::auth::FakeAuthVerifier;
use twochat_server::configurations::Environment;
use twochat_server::domain::Identity;
use twochat_server::endpoints::gifs::GifProviderClient;
use twochat_server::session::SessionRegistry;
use twochat_server::storage::memory::MemoryGateway;
use twochat_server::storage::PersistenceGateway;

use common::{NoopPush, SlowGateway};

fn encode_client_text_frame(payload: &str) -> Vec<u8> {
    let payload = payload.as_bytes();
    let mut out = Vec::with_capacity(payload.len() + 8);
    out.push(0x81); // FIN + text opcode
    let mask_key = [0x12u8, 0x34, 0x56, 0x78];
    let len = payload.len();
    if len <= 125 {
        out.push(0x80 | len as u8);
    } else {
        out.push(0x80 | 126);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    }
    out.extend_from_slice(&mask_key);
    out.extend(payload.iter().enumerate().map(|(i, b)| b ^ mask_key[i % 4]));
    out
}

/// Reads exactly one unmasked server-to-client text frame.
async fn read_text_frame(stream: &mut TcpStream) -> String {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await.unwrap();
    assert_eq!(header[0] & 0x0F, 1, "expected a text frame");
    let mut len = (header[1] & 0x7F) as usize;
    if len == 126 {
        let mut ext = [0u8; 2];
        stream.read_exact(&mut ext).await.unwrap();
        len = u16::from_be_bytes(ext) as usize;
    } else if len == 127 {
        let mut ext = [0u8; 8];
        stream.read_exact(&mut ext).await.unwrap();
        len = u64::from_be_bytes(ext) as usize;
    }
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.unwrap();
    String::from_utf8(payload).unwrap()
}

async fn websocket_handshake(stream: &mut TcpStream, addr: std::net::SocketAddr, identity: &str) {
    let request = format!(
        "GET /v1/live-updates HTTP/1.1\r\n\
         Host: {addr}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
         Sec-WebSocket-Version: 13\r\n\
         identity: {identity}\r\n\
         token: anything\r\n\
         \r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        stream.read_exact(&mut byte).await.unwrap();
        response.push(byte[0]);
        if response.ends_with(b"\r\n\r\n") {
            break;
        }
    }
    let response = String::from_utf8_lossy(&response);
    assert!(response.starts_with("HTTP/1.1 101"), "handshake rejected: {response}");
}

/// `spec.md` §5: responses are observed in request-arrival order. A slow
/// `SEND_MESSAGE` is written first, immediately followed by a
/// malformed-body `VIEW_MESSAGE` that resolves without ever awaiting the
/// gateway; the client must still see `r1`'s response before `r2`'s.
#[actix_rt::test]
async fn responses_are_returned_in_request_order() {
    let inner = Arc::new(MemoryGateway::new());
    let alice = Identity::from("alice");
    let bob = Identity::from("bob");
    inner.create_user_if_missing(&alice).await.unwrap();
    inner.create_user_if_missing(&bob).await.unwrap();
    let request_id = inner.create_friend_request(&alice, &bob, None).await.unwrap();
    let (conversation_id, _) = inner.accept_request(request_id, &bob).await.unwrap();

    let gateway = Arc::new(SlowGateway {
        inner,
        insert_delay: Duration::from_millis(200),
    });
    let registry = SessionRegistry::new().start();
    let push = Arc::new(NoopPush::default());
    let gif_provider = GifProviderClient::new("http://localhost".into());

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = twochat_server::run(
        listener,
        FakeAuthVerifier::default(),
        gateway,
        registry,
        push,
        gif_provider,
        Environment::Local,
    )
    .unwrap();
    tokio::spawn(server);

    let mut stream = TcpStream::connect(addr).await.unwrap();
    websocket_handshake(&mut stream, addr, "alice").await;

    let send_message = serde_json::json!({
        "requestType": "SEND_MESSAGE",
        "requestId": "r1",
        "body": {"conversationId": conversation_id.to_string(), "text": "slow"},
    });
    let view_message = serde_json::json!({
        "requestType": "VIEW_MESSAGE",
        "requestId": "r2",
        "body": {"conversationId": conversation_id.to_string()},
    });
    stream
        .write_all(&encode_client_text_frame(&send_message.to_string()))
        .await
        .unwrap();
    stream
        .write_all(&encode_client_text_frame(&view_message.to_string()))
        .await
        .unwrap();

    let first = read_text_frame(&mut stream).await;
    let second = read_text_frame(&mut stream).await;

    let first: serde_json::Value = serde_json::from_str(&first).unwrap();
    let second: serde_json::Value = serde_json::from_str(&second).unwrap();
    assert_eq!(first["requestId"], "r1", "r1's response must arrive first: {first}");
    assert_eq!(second["requestId"], "r2", "r2's response must arrive second: {second}");
    assert_eq!(first["statusCode"], 200);
    assert_eq!(second["statusCode"], 400);
}
