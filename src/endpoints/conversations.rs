// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use actix_web::{web, HttpRequest, HttpResponse};

use crate::auth::AuthVerifier;
use crate::domain::ConversationId;
use crate::errors::ApiError;
use crate::storage::{PersistenceGateway, RemoveConversationOutcome};

use super::authenticate;

/// `DELETE /conversations/v1/remove/{conversationId}` — cascade delete.
/// `spec.md` §6, §4.1.
pub async fn remove_conversation<A, G>(
    req: HttpRequest,
    path: web::Path<String>,
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

    match gateway.remove_conversation(conversation_id, &identity).await? {
        RemoveConversationOutcome::Ok => Ok(HttpResponse::Ok().finish()),
        RemoveConversationOutcome::NoPermission => Err(ApiError::Forbidden),
        RemoveConversationOutcome::NotFound => Err(ApiError::NotFound),
    }
}
