// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::auth::AuthVerifier;
use crate::domain::ConversationId;
use crate::errors::ApiError;
use crate::storage::PersistenceGateway;

use super::authenticate;

#[derive(Debug, Deserialize)]
pub struct LoadQuery {
    #[serde(default)]
    pub offset: i64,
}

/// `GET /messages/v1/load/{conversationId}?offset=N` — paged history +
/// unread count; marks the counterpart's messages in the loaded page as
/// viewed. `spec.md` §6.
pub async fn load_messages<A, G>(
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<LoadQuery>,
    auth: web::Data<A>,
    gateway: web::Data<std::sync::Arc<G>>,
) -> Result<HttpResponse, ApiError>
where
    A: AuthVerifier,
    G: PersistenceGateway,
{
    let identity = authenticate(&req, auth.get_ref()).await?;
    let conversation_id: ConversationId = path
        .into_inner()
        .parse()
        .map_err(|_| ApiError::BadRequest("invalid conversationId".into()))?;

    let conversation = gateway.get_members(conversation_id).await?;
    if !conversation.contains(&identity) {
        return Err(ApiError::Forbidden);
    }

    if let Some(counterpart) = conversation.other(&identity) {
        gateway
            .mark_viewed_bulk(&counterpart, conversation_id, query.offset)
            .await?;
    }

    let (messages, unread_count) = gateway
        .get_messages_page(conversation_id, query.offset, &identity)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "messages": messages,
        "unreadCount": unread_count,
    })))
}
