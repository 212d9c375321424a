// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Auth Verifier: a stateless client wrapper around the external
//! authentication service. `spec.md` §4.2. Grounded on the teacher's
//! `network_provider::MockNetworkProvider` — a thin `reqwest::Client`
//! wrapper with a typed error.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::Identity;
use crate::errors::{AuthError, VerifyOutcome};

const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait AuthVerifier: Send + Sync + 'static {
    async fn verify(&self, identity: &Identity, token: &str) -> Result<VerifyOutcome, AuthError>;
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    identity: &'a str,
    token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum VerifyResponse {
    Valid,
    Invalid,
    Suspended,
}

/// Production verifier: POSTs to the external auth service's verify
/// endpoint. Does not cache a result; the external service is authoritative
/// per spec.
#[derive(Debug, Clone)]
pub struct HttpAuthVerifier {
    client: reqwest::Client,
    verify_url: String,
}

impl HttpAuthVerifier {
    pub fn new(verify_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(VERIFY_TIMEOUT)
            .build()
            .expect("failed to build auth verifier http client");
        Self { client, verify_url }
    }
}

#[async_trait]
impl AuthVerifier for HttpAuthVerifier {
    async fn verify(&self, identity: &Identity, token: &str) -> Result<VerifyOutcome, AuthError> {
        let response = self
            .client
            .post(&self.verify_url)
            .json(&VerifyRequest {
                identity: identity.as_str(),
                token,
            })
            .send()
            .await?;
        let body: VerifyResponse = response.json().await?;
        Ok(match body {
            VerifyResponse::Valid => VerifyOutcome::Valid,
            VerifyResponse::Invalid => VerifyOutcome::Invalid,
            VerifyResponse::Suspended => VerifyOutcome::Suspended,
        })
    }
}

/// In-memory fake used by tests: every identity is valid unless it appears
/// in the `suspended`/`invalid` sets.
#[derive(Debug, Clone, Default)]
pub struct FakeAuthVerifier {
    pub suspended: std::collections::HashSet<String>,
    pub invalid: std::collections::HashSet<String>,
}

#[async_trait]
impl AuthVerifier for FakeAuthVerifier {
    async fn verify(&self, identity: &Identity, _token: &str) -> Result<VerifyOutcome, AuthError> {
        if self.suspended.contains(identity.as_str()) {
            Ok(VerifyOutcome::Suspended)
        } else if self.invalid.contains(identity.as_str()) {
            Ok(VerifyOutcome::Invalid)
        } else {
            Ok(VerifyOutcome::Valid)
        }
    }
}
