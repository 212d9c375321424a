// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Live-Update Engine: the WebSocket frame envelope and protocol state
//! machine. `spec.md` §4.4.

pub mod connection;
pub mod handlers;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every inbound frame: `{requestType, requestId, body}`. Unknown or
/// malformed frames never reach a typed variant — they are rejected before
/// `serde_json` attempts to tag-dispatch, see [`connection`].
#[derive(Debug, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "requestType")]
    pub request_type: String,
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(default)]
    pub body: Value,
    /// Legacy client-clock timestamp, used only by the send-time filter.
    #[serde(rename = "sendTime", default)]
    pub send_time: Option<chrono::DateTime<chrono::Utc>>,
}

/// An outbound response, correlated to one inbound request by `requestId`.
#[derive(Debug, Serialize)]
pub struct ResponseFrame {
    #[serde(rename = "msgType")]
    pub msg_type: &'static str,
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ResponseFrame {
    pub fn new(request_id: impl Into<String>, status_code: u16) -> Self {
        Self {
            msg_type: "RESPONSE",
            request_id: request_id.into(),
            status_code,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// An outbound, server-originated event — not correlated to any request.
#[derive(Debug, Serialize)]
pub struct EventFrame {
    #[serde(rename = "msgType")]
    pub msg_type: &'static str,
    #[serde(rename = "eventType")]
    pub event_type: &'static str,
    pub data: Value,
}

impl EventFrame {
    pub fn new(event_type: &'static str, data: Value) -> Self {
        Self {
            msg_type: "EVENT",
            event_type,
            data,
        }
    }
}

/// Seconds tolerated between a client-supplied `sendTime` and server time
/// before the frame is silently dropped. `spec.md` §4.4's legacy send-time
/// filter.
pub const CLOCK_SKEW_TOLERANCE_SECS: i64 = 5;

/// Whether a client-supplied `sendTime` is stale enough to silently drop the
/// frame. Pulled out of [`connection::LiveUpdateConnection::dispatch_frame`]
/// so the skew math has a seam testable without a live WebSocket actor.
pub fn is_stale_send_time(send_time: chrono::DateTime<chrono::Utc>, now: chrono::DateTime<chrono::Utc>) -> bool {
    (now - send_time).num_seconds() > CLOCK_SKEW_TOLERANCE_SECS
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn within_tolerance_is_not_stale() {
        let now = chrono::Utc::now();
        assert!(!is_stale_send_time(now - Duration::seconds(5), now));
    }

    #[test]
    fn past_tolerance_is_stale() {
        let now = chrono::Utc::now();
        assert!(is_stale_send_time(now - Duration::seconds(10), now));
    }
}

use std::sync::Arc;

use actix::Addr;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws as aws;

use crate::auth::AuthVerifier;
use crate::domain::Identity;
use crate::errors::VerifyOutcome;
use crate::push::PushDispatcher;
use crate::session::SessionRegistry;
use crate::storage::PersistenceGateway;

/// Upgrades an HTTP connection to the live-updates WebSocket. Grounded on
/// the teacher's `endpoints::qs::ws::upgrade_connection`: headers are
/// checked before handing off to `ws::start`, so an auth failure never
/// reaches the `[authenticated]` state of `spec.md` §4.4's machine — it is
/// refused at the HTTP upgrade instead of opening a socket only to close it
/// with 1008. 1008/1011 close codes (see [`connection`]) cover failures
/// that occur *after* the socket is open.
pub async fn upgrade_connection<A, G, P>(
    req: HttpRequest,
    stream: web::Payload,
    auth: web::Data<A>,
    gateway: web::Data<Arc<G>>,
    registry: web::Data<Addr<SessionRegistry>>,
    push: web::Data<Arc<P>>,
) -> Result<HttpResponse, Error>
where
    A: AuthVerifier,
    G: PersistenceGateway,
    P: PushDispatcher,
{
    let identity = req
        .headers()
        .get("identity")
        .and_then(|v| v.to_str().ok())
        .map(Identity::from);
    let token = req
        .headers()
        .get("token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let (identity, token) = match (identity, token) {
        (Some(identity), Some(token)) => (identity, token),
        _ => return Ok(HttpResponse::BadRequest().finish()),
    };

    match auth.verify(&identity, &token).await {
        Ok(VerifyOutcome::Valid) => {}
        Ok(VerifyOutcome::Invalid) | Ok(VerifyOutcome::Suspended) => {
            return Ok(HttpResponse::Unauthorized().finish());
        }
        Err(_) => return Ok(HttpResponse::InternalServerError().finish()),
    }

    let connection = connection::LiveUpdateConnection::new(
        identity,
        gateway.get_ref().clone(),
        registry.get_ref().clone(),
        push.get_ref().clone(),
    );
    aws::start(connection, &req, stream)
}
