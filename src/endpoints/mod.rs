// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Operation Façade: thin HTTP handlers translating boundary calls into
//! core operations. `spec.md` §2 calls this out as "not specified in
//! detail"; the shapes below follow the HTTP surface table in §6.

pub mod conversations;
pub mod friend_requests;
pub mod friends;
pub mod gifs;
pub mod health;
pub mod messages;
pub mod notifications;

use actix_web::HttpRequest;

use crate::auth::AuthVerifier;
use crate::domain::Identity;
use crate::errors::{ApiError, VerifyOutcome};

/// Shared header-based authentication for every authenticated route.
/// `spec.md` §6: headers `username`, `token`; 400 if missing, 401 invalid,
/// 403 suspended, 500 on transport failure.
pub async fn authenticate<A: AuthVerifier>(req: &HttpRequest, auth: &A) -> Result<Identity, ApiError> {
    let identity = req
        .headers()
        .get("username")
        .and_then(|v| v.to_str().ok())
        .map(Identity::from)
        .ok_or_else(|| ApiError::BadRequest("missing username header".into()))?;
    let token = req
        .headers()
        .get("token")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("missing token header".into()))?;

    match auth.verify(&identity, token).await? {
        VerifyOutcome::Valid => Ok(identity),
        VerifyOutcome::Invalid => Err(ApiError::Unauthenticated),
        VerifyOutcome::Suspended => Err(ApiError::Forbidden),
    }
}
