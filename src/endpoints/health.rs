// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use actix_web::{get, HttpResponse, Responder};

/// Version probe. `spec.md` §6: `GET /`, no auth.
#[get("/")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "name": "twochat-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
