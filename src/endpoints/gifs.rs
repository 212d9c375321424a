// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use actix_web::{get, web, HttpResponse};
use serde::Deserialize;

use crate::errors::ApiError;

/// Thin proxy to the external GIF search provider. Out of scope per
/// `spec.md` §1 ("Third-party services: GIF search... specified only via
/// their interfaces"); this client carries only the one call the HTTP
/// surface table names.
#[derive(Clone)]
pub struct GifProviderClient {
    client: reqwest::Client,
    search_url: String,
}

impl GifProviderClient {
    pub fn new(search_url: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("failed to build gif provider http client"),
            search_url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: String,
}

/// `GET /gifs/v1/search?search=Q` — proxy to GIF provider, no auth.
/// `spec.md` §6.
#[get("/gifs/v1/search")]
pub async fn search(
    query: web::Query<SearchQuery>,
    provider: web::Data<GifProviderClient>,
) -> Result<HttpResponse, ApiError> {
    let response = provider
        .client
        .get(&provider.search_url)
        .query(&[("search", &query.search)])
        .send()
        .await
        .map_err(|e| ApiError::TransportError(e.to_string()))?;
    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| ApiError::TransportError(e.to_string()))?;
    Ok(HttpResponse::Ok().json(body))
}
