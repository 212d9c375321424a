// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! One actix actor per open duplex session. `spec.md` §4.4. Grounded on the
//! teacher's `endpoints::qs::ws::QsWsConnection`: same heartbeat cadence,
//! same `StreamHandler<Result<ws::Message, ws::ProtocolError>>` shape, same
//! "attach on start, detach on stop" lifecycle — generalized from a single
//! binary protocol frame to our JSON request/response/event envelope.

use std::sync::Arc;
use std::time::{Duration, Instant};

use actix::prelude::*;
use actix_web_actors::ws;
use serde_json::json;

use crate::domain::Identity;
use crate::push::PushDispatcher;
use crate::session::{
    Broadcast, Connect, Disconnect, PresenceOf, ServerEvent, SessionHandleId, SessionRegistry,
};
use crate::storage::PersistenceGateway;

use super::handlers::{self, HandlerContext};
use super::{is_stale_send_time, EventFrame, InboundFrame, ResponseFrame};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct LiveUpdateConnection<G, P> {
    hb: Instant,
    handle_id: SessionHandleId,
    handler_ctx: HandlerContext<G, P>,
}

impl<G, P> LiveUpdateConnection<G, P>
where
    G: PersistenceGateway,
    P: PushDispatcher,
{
    pub fn new(identity: Identity, gateway: Arc<G>, registry: Addr<SessionRegistry>, push: Arc<P>) -> Self {
        Self {
            hb: Instant::now(),
            handle_id: SessionHandleId::new(),
            handler_ctx: HandlerContext {
                gateway,
                registry,
                push,
                identity,
            },
        }
    }

    fn heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl<G, P> Actor for LiveUpdateConnection<G, P>
where
    G: PersistenceGateway,
    P: PushDispatcher,
{
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.heartbeat(ctx);

        let recipient = ctx.address().recipient();
        let registry = self.handler_ctx.registry.clone();
        let gateway = self.handler_ctx.gateway.clone();
        let identity = self.handler_ctx.identity.clone();
        let handle_id = self.handle_id;

        let fut = async move {
            let became_present = registry
                .send(Connect {
                    identity: identity.clone(),
                    handle_id,
                    recipient,
                })
                .await
                .unwrap_or(false);
            if became_present {
                broadcast_presence(&gateway, &registry, &identity, true).await;
            }
        };
        ctx.spawn(fut.into_actor(self));
    }

    fn stopping(&mut self, _ctx: &mut Self::Context) -> Running {
        let registry = self.handler_ctx.registry.clone();
        let gateway = self.handler_ctx.gateway.clone();
        let identity = self.handler_ctx.identity.clone();
        let handle_id = self.handle_id;

        actix::spawn(async move {
            let became_absent = registry
                .send(Disconnect { identity: identity.clone(), handle_id })
                .await
                .unwrap_or(false);
            if became_absent {
                broadcast_presence(&gateway, &registry, &identity, false).await;
            }
        });
        Running::Stop
    }
}

/// `PRESENCE_CHANGE` fans out to the identity's friends, not to the
/// identity itself. `spec.md` §4.3.
async fn broadcast_presence<G: PersistenceGateway>(
    gateway: &Arc<G>,
    registry: &Addr<SessionRegistry>,
    identity: &Identity,
    online: bool,
) {
    let friends = match gateway.get_friends(identity).await {
        Ok(f) => f,
        Err(_) => return,
    };
    let targets = friends.into_iter().map(|f| f.friend).collect();
    let event = EventFrame::new(
        "PRESENCE_CHANGE",
        json!({ "identity": identity.as_str(), "online": online }),
    );
    registry.do_send(Broadcast {
        targets,
        payload: serde_json::to_string(&event).unwrap_or_default(),
    });
}

impl<G, P> Handler<ServerEvent> for LiveUpdateConnection<G, P>
where
    G: PersistenceGateway,
    P: PushDispatcher,
{
    type Result = ();

    fn handle(&mut self, msg: ServerEvent, ctx: &mut Self::Context) -> Self::Result {
        ctx.text(msg.0);
    }
}

impl<G, P> StreamHandler<Result<ws::Message, ws::ProtocolError>> for LiveUpdateConnection<G, P>
where
    G: PersistenceGateway,
    P: PushDispatcher,
{
    fn handle(&mut self, item: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let msg = match item {
            Ok(msg) => msg,
            Err(_) => {
                ctx.close(Some(ws::CloseReason {
                    code: ws::CloseCode::Error,
                    description: None,
                }));
                ctx.stop();
                return;
            }
        };

        match msg {
            ws::Message::Ping(bytes) => {
                self.hb = Instant::now();
                ctx.pong(&bytes);
            }
            ws::Message::Pong(_) => {
                self.hb = Instant::now();
            }
            ws::Message::Text(text) => {
                self.hb = Instant::now();
                self.dispatch_frame(text.to_string(), ctx);
            }
            ws::Message::Close(reason) => {
                ctx.close(reason);
                ctx.stop();
            }
            ws::Message::Continuation(_) | ws::Message::Nop | ws::Message::Binary(_) => {}
        }
    }
}

impl<G, P> LiveUpdateConnection<G, P>
where
    G: PersistenceGateway,
    P: PushDispatcher,
{
    fn dispatch_frame(&mut self, text: String, ctx: &mut ws::WebsocketContext<Self>) {
        let frame: InboundFrame = match serde_json::from_str(&text) {
            Ok(f) => f,
            Err(_) => {
                let response = ResponseFrame::new("unknown", 400)
                    .with_message("Missing requestType or requestId");
                ctx.text(serde_json::to_string(&response).unwrap_or_default());
                return;
            }
        };

        // Legacy send-time filter: silently drop stale client-clock frames.
        // No response, no event. `spec.md` §4.4.
        if let Some(send_time) = frame.send_time {
            if is_stale_send_time(send_time, chrono::Utc::now()) {
                return;
            }
        }

        let handler_ctx = self.handler_ctx.clone();
        let request_type = frame.request_type;
        let request_id = frame.request_id;
        let body = frame.body;

        let fut = async move {
            let response = match request_type.as_str() {
                "SEND_MESSAGE" => handlers::handle_send_message(&handler_ctx, &request_id, body).await,
                "VIEW_MESSAGE" => handlers::handle_view_message(&handler_ctx, &request_id, body).await,
                "USER_TYPING" => handlers::handle_user_typing(&handler_ctx, &request_id, body).await,
                other => ResponseFrame::new(&request_id, 400)
                    .with_message(format!("Unknown requestType: {other}")),
            };
            response
        };

        // `.wait(ctx)` rather than `ctx.spawn`: blocks further
        // `StreamHandler::handle` calls on this actor until the response is
        // written, so frame N's response always reaches the client before
        // frame N+1's. `spec.md` §5.
        fut.into_actor(self)
            .map(|response, _act, ctx| {
                ctx.text(serde_json::to_string(&response).unwrap_or_default());
            })
            .wait(ctx);
    }
}
