//! Client and wire types for the ledger HTTP endpoints.
//!
//! # Endpoints
//!
//! - `POST /api/ledger/delete` - privileged deletion of a pedido's rows
//! - `PATCH /api/ledger/entries` - batched quantity/cost update
//!
//! Both authenticate with `Authorization: Bearer <BODEGA_LEDGER_API_KEY>`.
//! A `success: false` body is returned alongside every non-2xx status.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use bodega_core::{LedgerEntryId, PedidoId};

use super::inventory::{PrivilegedLedger, StoreError};
use crate::config::LedgerApiConfig;
use crate::models::ledger::LedgerEntryUpdate;

/// Path of the privileged deletion endpoint.
pub const DELETE_PATH: &str = "/api/ledger/delete";

/// Path of the batched update endpoint.
pub const UPDATE_PATH: &str = "/api/ledger/entries";

/// Body of `POST /api/ledger/delete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteEntriesRequest {
    pub pedido_id: PedidoId,
    pub entry_ids: Vec<LedgerEntryId>,
}

/// Response of `POST /api/ledger/delete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteEntriesResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of `PATCH /api/ledger/entries`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchUpdateRequest {
    pub updates: Vec<LedgerEntryUpdate>,
}

/// Response of `PATCH /api/ledger/entries`, and the failure body of both
/// endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchUpdateResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchUpdateResponse {
    /// A failure body.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Errors that can occur when calling the ledger endpoints.
#[derive(Debug, Error)]
pub enum LedgerApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Endpoint answered 2xx but reported `success: false`.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Endpoint URL could not be built.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Client for the ledger endpoints of a running `bodega-admin`.
#[derive(Clone)]
pub struct LedgerApiClient {
    inner: Arc<LedgerApiClientInner>,
}

struct LedgerApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
}

impl LedgerApiClient {
    /// Create a client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &LedgerApiConfig) -> Result<Self, LedgerApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("bodega/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(LedgerApiClientInner {
                client,
                base_url: config.base_url.clone(),
                api_key: config.api_key.clone(),
            }),
        })
    }

    /// Hard delete the given rows of one pedido. Returns rows removed.
    ///
    /// # Errors
    ///
    /// Returns `LedgerApiError` on transport failure, a non-success status,
    /// or a `success: false` body.
    #[instrument(skip(self, entry_ids), fields(entries = entry_ids.len()))]
    pub async fn delete_entries(
        &self,
        pedido_id: PedidoId,
        entry_ids: &[LedgerEntryId],
    ) -> Result<u64, LedgerApiError> {
        let body = DeleteEntriesRequest {
            pedido_id,
            entry_ids: entry_ids.to_vec(),
        };
        let response: DeleteEntriesResponse = self
            .send(self.inner.client.post(self.url(DELETE_PATH)?), &body)
            .await?;

        if !response.success {
            return Err(LedgerApiError::Rejected(
                response.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        let deleted = response.deleted.unwrap_or(0);
        debug!(%pedido_id, deleted, "Privileged delete completed");
        Ok(deleted)
    }

    /// Apply a batch of quantity/cost changes.
    ///
    /// # Errors
    ///
    /// Returns `LedgerApiError` on transport failure, a non-success status,
    /// or a `success: false` body.
    #[instrument(skip(self, updates), fields(updates = updates.len()))]
    pub async fn update_entries(&self, updates: &[LedgerEntryUpdate]) -> Result<(), LedgerApiError> {
        let body = BatchUpdateRequest {
            updates: updates.to_vec(),
        };
        let response: BatchUpdateResponse = self
            .send(self.inner.client.patch(self.url(UPDATE_PATH)?), &body)
            .await?;

        if response.success {
            Ok(())
        } else {
            Err(LedgerApiError::Rejected(
                response.error.unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }

    fn url(&self, path: &str) -> Result<Url, LedgerApiError> {
        Ok(self.inner.base_url.join(path)?)
    }

    async fn send<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        request: reqwest::RequestBuilder,
        body: &B,
    ) -> Result<T, LedgerApiError> {
        let response = request
            .bearer_auth(self.inner.api_key.expose_secret())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        Err(Self::parse_error(status, response).await)
    }

    async fn parse_error(status: StatusCode, response: reqwest::Response) -> LedgerApiError {
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = serde_json::from_str::<BatchUpdateResponse>(&text)
            .ok()
            .and_then(|body| body.error)
            .unwrap_or(text);

        LedgerApiError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

impl std::fmt::Debug for LedgerApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl PrivilegedLedger for LedgerApiClient {
    async fn delete_entries(
        &self,
        pedido_id: PedidoId,
        ids: &[LedgerEntryId],
    ) -> Result<u64, StoreError> {
        Ok(Self::delete_entries(self, pedido_id, ids).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_request_wire_format() {
        let body = DeleteEntriesRequest {
            pedido_id: PedidoId::new(uuid::Uuid::nil()),
            entry_ids: vec![LedgerEntryId::new(uuid::Uuid::nil())],
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "pedidoId": "00000000-0000-0000-0000-000000000000",
                "entryIds": ["00000000-0000-0000-0000-000000000000"]
            })
        );
    }

    #[test]
    fn test_delete_response_optional_fields() {
        let ok: DeleteEntriesResponse =
            serde_json::from_str(r#"{"success": true, "deleted": 3}"#).unwrap();
        assert_eq!(ok.deleted, Some(3));
        assert!(ok.error.is_none());

        let failed: DeleteEntriesResponse =
            serde_json::from_str(r#"{"success": false, "error": "denied"}"#).unwrap();
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("denied"));
    }

    #[test]
    fn test_client_debug_redacts_key() {
        let client = LedgerApiClient::new(&LedgerApiConfig {
            base_url: Url::parse("http://127.0.0.1:3002").unwrap(),
            api_key: SecretString::from("kP9$vX2!qL7@"),
        })
        .unwrap();

        let debug = format!("{client:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("kP9$vX2!qL7@"));
    }

    #[test]
    fn test_endpoint_urls() {
        let client = LedgerApiClient::new(&LedgerApiConfig {
            base_url: Url::parse("https://bodega.internal/").unwrap(),
            api_key: SecretString::from("k"),
        })
        .unwrap();
        assert_eq!(
            client.url(DELETE_PATH).unwrap().as_str(),
            "https://bodega.internal/api/ledger/delete"
        );
    }
}
