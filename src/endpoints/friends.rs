// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::collections::HashMap;

use actix::Addr;
use actix_web::{web, HttpRequest, HttpResponse};

use crate::auth::AuthVerifier;
use crate::errors::ApiError;
use crate::session::{PresenceOf, SessionRegistry};
use crate::storage::PersistenceGateway;

use super::authenticate;

/// `GET /friends/v1/get_friends` — friends + presence + last message.
/// `spec.md` §6. Wired with `web::get().to(...)` rather than the `#[get]`
/// attribute macro because this handler is generic over the auth/gateway
/// implementation — the same reason the teacher's generic DS/QS handlers
/// use `.route(path, web::post().to(handler::<T>))` in `lib.rs`.
pub async fn get_friends<A, G>(
    req: HttpRequest,
    auth: web::Data<A>,
    gateway: web::Data<std::sync::Arc<G>>,
    registry: web::Data<Addr<SessionRegistry>>,
) -> Result<HttpResponse, ApiError>
where
    A: AuthVerifier,
    G: PersistenceGateway,
{
    let identity = authenticate(&req, auth.get_ref()).await?;
    let mut friends = gateway.get_friends(&identity).await?;

    let identities = friends.iter().map(|f| f.friend.clone()).collect();
    let presence: HashMap<_, _> = registry
        .send(PresenceOf(identities))
        .await
        .unwrap_or_default()
        .into_iter()
        .collect();
    for friend in &mut friends {
        friend.online = presence.get(&friend.friend).copied().unwrap_or(false);
    }

    Ok(HttpResponse::Ok().json(friends))
}
