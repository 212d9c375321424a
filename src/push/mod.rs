// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Push Dispatcher: fire-and-forget delivery to the external push gateway.
//! `spec.md` §4.6. Grounded on the teacher's
//! `push_notification_provider::ProductionPushNotificationProvider`,
//! simplified to a single opaque gateway — the teacher's per-platform
//! APNs/FCM JWT signing is specific to its own mobile integration and is not
//! named anywhere in this spec's external interfaces (see DESIGN.md).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::Identity;
use crate::errors::PushError;
use crate::storage::PersistenceGateway;

const PUSH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
pub struct PushPayload<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub data: serde_json::Value,
    pub badge: i64,
    pub push_tokens: Vec<String>,
}

#[async_trait]
pub trait PushDispatcher: Send + Sync + 'static {
    /// Resolve `identity`'s push tokens and deliver. Never returns an error
    /// to the caller for delivery failures — those are logged and
    /// swallowed per spec; this returns `Result` only so the gateway lookup
    /// failure has somewhere to go (also swallowed at the call site).
    async fn dispatch(
        &self,
        title: &str,
        body: &str,
        data: serde_json::Value,
        identity: &Identity,
        badge: i64,
    ) -> Result<(), PushError>;
}

/// Production dispatcher: POSTs a batched payload to the external push
/// gateway with a 10s timeout.
pub struct HttpPushDispatcher<G> {
    client: reqwest::Client,
    gateway_url: String,
    storage: Arc<G>,
}

impl<G: PersistenceGateway> HttpPushDispatcher<G> {
    pub fn new(gateway_url: String, storage: Arc<G>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(PUSH_TIMEOUT)
            .build()
            .expect("failed to build push dispatcher http client");
        Self {
            client,
            gateway_url,
            storage,
        }
    }
}

#[async_trait]
impl<G: PersistenceGateway> PushDispatcher for HttpPushDispatcher<G> {
    async fn dispatch(
        &self,
        title: &str,
        body: &str,
        data: serde_json::Value,
        identity: &Identity,
        badge: i64,
    ) -> Result<(), PushError> {
        let tokens = self
            .storage
            .get_push_tokens(identity)
            .await
            .map_err(|e| PushError::TransportError(e.to_string()))?
            .into_iter()
            .map(|r| r.push_token)
            .collect::<Vec<_>>();
        if tokens.is_empty() {
            return Ok(());
        }
        let payload = PushPayload {
            title,
            body,
            data,
            badge,
            push_tokens: tokens,
        };
        self.client
            .post(&self.gateway_url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Spawns the push as a detached task so the caller's response path is
/// never delayed by it, logging and swallowing any failure.
pub fn fire_and_forget<D: PushDispatcher>(
    dispatcher: Arc<D>,
    title: String,
    body: String,
    data: serde_json::Value,
    identity: Identity,
    badge: i64,
) {
    tokio::spawn(async move {
        if let Err(err) = dispatcher
            .dispatch(&title, &body, data, &identity, badge)
            .await
        {
            tracing::warn!(identity = %identity, error = %err, "push notification delivery failed");
        }
    });
}
