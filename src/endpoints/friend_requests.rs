// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::auth::AuthVerifier;
use crate::domain::RequestId;
use crate::errors::ApiError;
use crate::storage::PersistenceGateway;

use super::authenticate;

pub async fn get_requests<A, G>(
    req: HttpRequest,
    auth: web::Data<A>,
    gateway: web::Data<std::sync::Arc<G>>,
) -> Result<HttpResponse, ApiError>
where
    A: AuthVerifier,
    G: PersistenceGateway,
{
    let identity = authenticate(&req, auth.get_ref()).await?;
    let requests = gateway.get_incoming_requests(&identity).await?;
    Ok(HttpResponse::Ok().json(requests))
}

pub async fn outgoing_requests<A, G>(
    req: HttpRequest,
    auth: web::Data<A>,
    gateway: web::Data<std::sync::Arc<G>>,
) -> Result<HttpResponse, ApiError>
where
    A: AuthVerifier,
    G: PersistenceGateway,
{
    let identity = authenticate(&req, auth.get_ref()).await?;
    let requests = gateway.get_outgoing_requests(&identity).await?;
    Ok(HttpResponse::Ok().json(requests))
}

#[derive(Debug, Deserialize)]
pub struct AddFriendBody {
    pub recipient: String,
    pub message: Option<String>,
}

pub async fn add_friend<A, G>(
    req: HttpRequest,
    body: web::Json<AddFriendBody>,
    auth: web::Data<A>,
    gateway: web::Data<std::sync::Arc<G>>,
) -> Result<HttpResponse, ApiError>
where
    A: AuthVerifier,
    G: PersistenceGateway,
{
    let identity = authenticate(&req, auth.get_ref()).await?;
    let recipient = body.recipient.clone().into();
    let request_id = gateway
        .create_friend_request(&identity, &recipient, body.message.clone())
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "requestId": request_id.to_string() })))
}

#[derive(Debug, Deserialize)]
pub struct RequestIdBody {
    pub request_id: String,
}

pub async fn accept_request<A, G>(
    req: HttpRequest,
    body: web::Json<RequestIdBody>,
    auth: web::Data<A>,
    gateway: web::Data<std::sync::Arc<G>>,
) -> Result<HttpResponse, ApiError>
where
    A: AuthVerifier,
    G: PersistenceGateway,
{
    let identity = authenticate(&req, auth.get_ref()).await?;
    let request_id: RequestId = body
        .request_id
        .parse()
        .map_err(|_| ApiError::BadRequest("invalid request_id".into()))?;
    let (conversation_id, sender) = gateway.accept_request(request_id, &identity).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "conversationId": conversation_id.to_string(),
        "sender": sender.as_str(),
    })))
}

pub async fn deny_request<A, G>(
    req: HttpRequest,
    body: web::Json<RequestIdBody>,
    auth: web::Data<A>,
    gateway: web::Data<std::sync::Arc<G>>,
) -> Result<HttpResponse, ApiError>
where
    A: AuthVerifier,
    G: PersistenceGateway,
{
    let identity = authenticate(&req, auth.get_ref()).await?;
    let request_id: RequestId = body
        .request_id
        .parse()
        .map_err(|_| ApiError::BadRequest("invalid request_id".into()))?;
    gateway.deny_request(request_id, &identity).await?;
    Ok(HttpResponse::Ok().finish())
}
