// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::auth::AuthVerifier;
use crate::errors::ApiError;
use crate::storage::PersistenceGateway;

use super::authenticate;

#[derive(Debug, Deserialize)]
pub struct PushTokenBody {
    #[serde(rename = "push-token")]
    pub push_token: String,
}

/// `POST /notifications/v1/register` — register device. `spec.md` §6.
pub async fn register<A, G>(
    req: HttpRequest,
    body: web::Json<PushTokenBody>,
    auth: web::Data<A>,
    gateway: web::Data<std::sync::Arc<G>>,
) -> Result<HttpResponse, ApiError>
where
    A: AuthVerifier,
    G: PersistenceGateway,
{
    let identity = authenticate(&req, auth.get_ref()).await?;
    gateway.add_push_token(body.push_token.clone(), &identity).await?;
    Ok(HttpResponse::Ok().finish())
}

/// `POST /notifications/v1/unregister` — unregister device. No auth header
/// per `spec.md` §6: the token itself is the capability.
pub async fn unregister<G>(
    body: web::Json<PushTokenBody>,
    gateway: web::Data<std::sync::Arc<G>>,
) -> Result<HttpResponse, ApiError>
where
    G: PersistenceGateway,
{
    gateway.remove_push_token(&body.push_token).await?;
    Ok(HttpResponse::Ok().finish())
}
