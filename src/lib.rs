// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! `twochat-server`: the server-side core of a two-party instant-messaging
//! service. See `SPEC_FULL.md` for the full module map.

pub mod api_docs;
pub mod auth;
pub mod configurations;
pub mod domain;
pub mod endpoints;
pub mod errors;
pub mod push;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod telemetry;
pub mod ws;

use std::net::TcpListener;
use std::sync::Arc;

use actix::Addr;
use actix_web::{dev::Server, web, App, HttpServer};
use tracing_actix_web::TracingLogger;

use crate::auth::AuthVerifier;
use crate::configurations::Environment;
use crate::endpoints::gifs::GifProviderClient;
use crate::push::PushDispatcher;
use crate::session::SessionRegistry;
use crate::storage::PersistenceGateway;

/// Builds and starts the HTTP/WS server. Grounded on the teacher's `lib.rs`:
/// wrap each provider in `Data<T>`, `TracingLogger` middleware, register
/// routes, `.listen(listener)?.run()`. Every handler here is generic over
/// the auth/gateway/push implementation, so routes are wired with
/// `web::get().to(handler::<T>)` rather than the `#[get]`/`#[post]`
/// attribute macros, exactly as the teacher wires its own generic DS/QS
/// handlers.
#[allow(clippy::too_many_arguments)]
pub fn run<A, G, P>(
    listener: TcpListener,
    auth: A,
    gateway: Arc<G>,
    registry: Addr<SessionRegistry>,
    push: Arc<P>,
    gif_provider: GifProviderClient,
    environment: Environment,
) -> Result<Server, std::io::Error>
where
    A: AuthVerifier,
    G: PersistenceGateway,
    P: PushDispatcher,
{
    let auth = web::Data::new(auth);
    let gateway_data = web::Data::new(gateway);
    let registry_data = web::Data::new(registry);
    let push_data = web::Data::new(push);
    let gif_provider = web::Data::new(gif_provider);
    let serve_api_docs = !environment.disables_api_docs();

    tracing::info!(
        addr = %listener.local_addr().expect("could not get local address"),
        "starting server",
    );

    let server = HttpServer::new(move || {
        let mut app = App::new()
            .wrap(TracingLogger::default())
            .app_data(auth.clone())
            .app_data(gateway_data.clone())
            .app_data(registry_data.clone())
            .app_data(push_data.clone())
            .app_data(gif_provider.clone())
            .service(endpoints::health::health_check)
            .service(endpoints::gifs::search)
            .route(
                "/friends/v1/get_friends",
                web::get().to(endpoints::friends::get_friends::<A, G>),
            )
            .route(
                "/friend_requests/v1/get_requests",
                web::get().to(endpoints::friend_requests::get_requests::<A, G>),
            )
            .route(
                "/friend_requests/v1/outgoing_requests",
                web::get().to(endpoints::friend_requests::outgoing_requests::<A, G>),
            )
            .route(
                "/friend_requests/v1/add_friend",
                web::post().to(endpoints::friend_requests::add_friend::<A, G>),
            )
            .route(
                "/friend_requests/v1/accept_request",
                web::post().to(endpoints::friend_requests::accept_request::<A, G>),
            )
            .route(
                "/friend_requests/v1/deny_request",
                web::post().to(endpoints::friend_requests::deny_request::<A, G>),
            )
            .route(
                "/messages/v1/load/{conversation_id}",
                web::get().to(endpoints::messages::load_messages::<A, G>),
            )
            .route(
                "/conversations/v1/remove/{conversation_id}",
                web::delete().to(endpoints::conversations::remove_conversation::<A, G>),
            )
            .route(
                "/notifications/v1/register",
                web::post().to(endpoints::notifications::register::<A, G>),
            )
            .route(
                "/notifications/v1/unregister",
                web::post().to(endpoints::notifications::unregister::<G>),
            )
            .route(
                "/v1/live-updates",
                web::get().to(ws::upgrade_connection::<A, G, P>),
            );

        if serve_api_docs {
            app = app.route("/api-docs", web::get().to(api_docs::serve_api_docs));
        }

        app
    })
    .listen(listener)?
    .run();

    Ok(server)
}
