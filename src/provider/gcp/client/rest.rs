//! GCS JSON API REST Client
//!
//! Native REST implementation of the bucket calls the operator needs, over
//! reqwest with rustls.
//!
//! - `GET /storage/v1/b/{bucket}` - bucket attributes, 404 means absent
//! - `POST /storage/v1/b?project={project}` - bucket insert
//! - `DELETE /storage/v1/b/{bucket}` - bucket delete (the bucket must be empty)
//!
//! Authentication uses the GKE/GCE metadata server (Workload Identity). The
//! access token is cached and refreshed shortly before it expires. When
//! `STORAGE_EMULATOR_HOST` is set, requests go to the emulator without
//! credentials.
//!
//! References:
//! - [Cloud Storage JSON API v1](https://cloud.google.com/storage/docs/json_api/v1/buckets)

use crate::config::ControllerConfig;
use crate::constants::{METADATA_TOKEN_URL, TOKEN_REFRESH_MARGIN_SECS};
use crate::provider::{BucketAttrs, BucketProvider, NewBucket};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::{debug, field, info, info_span, Instrument};

use super::common::{emulator_base_url, format_bucket_path, format_insert_path, OperationTracker};

// ============================================================================
// GCS JSON API payloads
// ============================================================================

/// Bucket resource as returned by `buckets.get`
///
/// Only the fields the operator inspects are deserialized.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketResource {
    name: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    storage_class: Option<String>,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

impl From<BucketResource> for BucketAttrs {
    fn from(resource: BucketResource) -> Self {
        Self {
            name: resource.name,
            location: resource.location,
            storage_class: resource.storage_class,
            labels: resource.labels,
        }
    }
}

/// Request body for `buckets.insert`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertBucketRequest<'a> {
    name: &'a str,
    location: &'a str,
    storage_class: &'a str,
    labels: &'a BTreeMap<String, String>,
}

/// Standard Google API error envelope
#[derive(Debug, Deserialize)]
struct GcsErrorResponse {
    error: GcsError,
}

#[derive(Debug, Deserialize)]
struct GcsError {
    code: u16,
    message: String,
}

/// Access token response from the metadata server
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + ChronoDuration::seconds(TOKEN_REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// How requests are authenticated
#[derive(Debug)]
pub enum GcsAuth {
    /// Bearer token from the metadata server, cached until near expiry
    MetadataServer,
    /// No credentials (storage emulator)
    Anonymous,
}

/// GCS JSON API client
pub struct GcsREST {
    http_client: Client,
    base_url: String,
    auth: GcsAuth,
    token: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for GcsREST {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsREST")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

impl GcsREST {
    /// Create a client for `base_url` (without a trailing `/storage/v1`)
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(base_url: &str, auth: GcsAuth) -> Result<Self> {
        let http_client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            token: Mutex::new(None),
        })
    }

    /// Build a client from operator configuration
    ///
    /// `STORAGE_EMULATOR_HOST` takes precedence over `GCS_ENDPOINT` and
    /// disables authentication.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn from_config(config: &ControllerConfig) -> Result<Self> {
        if let Some(host) = config.storage_emulator_host.as_deref() {
            let base_url = emulator_base_url(host);
            info!("Using storage emulator at {}", base_url);
            Self::new(&base_url, GcsAuth::Anonymous)
        } else {
            info!(
                "Using GCS endpoint {} with Workload Identity authentication",
                config.gcs_endpoint
            );
            Self::new(&config.gcs_endpoint, GcsAuth::MetadataServer)
        }
    }

    /// Return a valid access token, refreshing it from the metadata server if needed
    async fn access_token(&self) -> Result<Option<String>> {
        if matches!(self.auth, GcsAuth::Anonymous) {
            return Ok(None);
        }

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(Some(token.value.clone()));
        }

        let response = self
            .http_client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .context(
                "Failed to reach the metadata server. Ensure the pod runs on GKE/GCE with Workload Identity enabled",
            )?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Metadata server returned HTTP {}: {}",
                status.as_u16(),
                error_text
            ));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response from metadata server")?;
        debug!(
            expires_in = token_response.expires_in,
            "Retrieved access token from metadata server"
        );

        let token = CachedToken {
            value: token_response.access_token,
            expires_at: Utc::now() + ChronoDuration::seconds(token_response.expires_in),
        };
        let value = token.value.clone();
        *cached = Some(token);
        Ok(Some(value))
    }

    /// Build an HTTP request with authentication headers
    async fn make_request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::RequestBuilder> {
        let url = format!("{}/{}", self.base_url, path);
        let mut request = self.http_client.request(method, &url);

        if let Some(token) = self.access_token().await? {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        Ok(request)
    }
}

/// Turn a non-success GCS response into an error
fn handle_error_response(status: StatusCode, error_text: &str) -> anyhow::Error {
    if let Ok(error_response) = serde_json::from_str::<GcsErrorResponse>(error_text) {
        anyhow::anyhow!(
            "GCS API error: {} (code: {})",
            error_response.error.message,
            error_response.error.code
        )
    } else {
        anyhow::anyhow!("HTTP {} (status: {}): {}", status.as_u16(), status, error_text)
    }
}

#[async_trait]
impl BucketProvider for GcsREST {
    async fn get_bucket_attrs(&self, name: &str) -> Result<Option<BucketAttrs>> {
        let span = tracing::debug_span!(
            "gcs.bucket.get",
            bucket.name = name,
            operation.success = field::Empty,
            operation.found = field::Empty,
            operation.duration_ms = field::Empty,
            error.message = field::Empty,
        );
        let tracker = OperationTracker::new(span.clone(), "get");

        async move {
            let response = self
                .make_request(Method::GET, &format_bucket_path(name), None)
                .await?
                .send()
                .await
                .context("Failed to get bucket")?;

            match response.status() {
                status if status.is_success() => {
                    let resource: BucketResource = response
                        .json()
                        .await
                        .context("Failed to parse bucket response")?;
                    tracker.record_success();
                    Ok(Some(resource.into()))
                }
                StatusCode::NOT_FOUND => {
                    tracker.record_not_found();
                    Ok(None)
                }
                status => {
                    let error_text = response.text().await.unwrap_or_default();
                    tracker.record_error(&error_text);
                    Err(handle_error_response(status, &error_text))
                        .with_context(|| format!("Failed to get GCS bucket: {name}"))
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn create_bucket(&self, bucket: &NewBucket) -> Result<()> {
        let span = info_span!(
            "gcs.bucket.create",
            bucket.name = %bucket.name,
            project.id = %bucket.project,
            bucket.location = %bucket.location,
            operation.success = field::Empty,
            operation.duration_ms = field::Empty,
            error.message = field::Empty,
        );
        let tracker = OperationTracker::new(span.clone(), "create");

        async move {
            let request = InsertBucketRequest {
                name: &bucket.name,
                location: &bucket.location,
                storage_class: &bucket.storage_class,
                labels: &bucket.labels,
            };

            let response = self
                .make_request(
                    Method::POST,
                    &format_insert_path(&bucket.project),
                    Some(serde_json::to_value(&request)?),
                )
                .await?
                .send()
                .await
                .context("Failed to create bucket")?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_default();
                tracker.record_error(&error_text);
                return Err(handle_error_response(status, &error_text))
                    .with_context(|| format!("Failed to create GCS bucket: {}", bucket.name));
            }

            info!("Created GCS bucket {}", bucket.name);
            tracker.record_success();
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn delete_bucket(&self, name: &str) -> Result<()> {
        let span = info_span!(
            "gcs.bucket.delete",
            bucket.name = name,
            operation.success = field::Empty,
            operation.found = field::Empty,
            operation.duration_ms = field::Empty,
            error.message = field::Empty,
        );
        let tracker = OperationTracker::new(span.clone(), "delete");

        async move {
            let response = self
                .make_request(Method::DELETE, &format_bucket_path(name), None)
                .await?
                .send()
                .await
                .context("Failed to delete bucket")?;

            match response.status() {
                status if status.is_success() => {
                    info!("Deleted GCS bucket {}", name);
                    tracker.record_success();
                    Ok(())
                }
                // Deleted between our lookup and this call
                StatusCode::NOT_FOUND => {
                    tracker.record_not_found();
                    Ok(())
                }
                status => {
                    let error_text = response.text().await.unwrap_or_default();
                    tracker.record_error(&error_text);
                    Err(handle_error_response(status, &error_text))
                        .with_context(|| format!("Failed to delete GCS bucket: {name}"))
                }
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_resource_parsing() {
        let body = r#"{
            "kind": "storage#bucket",
            "id": "logs-eu",
            "name": "logs-eu",
            "location": "EU",
            "storageClass": "STANDARD",
            "labels": {"bucket-operator-owner": "logs"}
        }"#;
        let resource: BucketResource = serde_json::from_str(body).unwrap();
        let attrs = BucketAttrs::from(resource);

        assert_eq!(attrs.name, "logs-eu");
        assert_eq!(attrs.location.as_deref(), Some("EU"));
        assert_eq!(attrs.storage_class.as_deref(), Some("STANDARD"));
        assert_eq!(
            attrs.labels.get("bucket-operator-owner").map(String::as_str),
            Some("logs")
        );
    }

    #[test]
    fn test_bucket_resource_without_labels() {
        let resource: BucketResource = serde_json::from_str(r#"{"name": "bare"}"#).unwrap();
        let attrs = BucketAttrs::from(resource);
        assert!(attrs.labels.is_empty());
        assert!(attrs.location.is_none());
    }

    #[test]
    fn test_insert_request_uses_camel_case() {
        let labels = BTreeMap::from([("bucket-operator-owner".to_string(), "logs".to_string())]);
        let request = InsertBucketRequest {
            name: "logs-eu",
            location: "EU",
            storage_class: "NEARLINE",
            labels: &labels,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["storageClass"], "NEARLINE");
        assert_eq!(value["labels"]["bucket-operator-owner"], "logs");
    }

    #[test]
    fn test_handle_error_response_parses_google_envelope() {
        let err = handle_error_response(
            StatusCode::FORBIDDEN,
            r#"{"error": {"code": 403, "message": "caller lacks storage.buckets.create"}}"#,
        );
        assert_eq!(
            err.to_string(),
            "GCS API error: caller lacks storage.buckets.create (code: 403)"
        );
    }

    #[test]
    fn test_handle_error_response_falls_back_to_raw_body() {
        let err = handle_error_response(StatusCode::BAD_GATEWAY, "upstream reset");
        assert!(err.to_string().starts_with("HTTP 502"));
        assert!(err.to_string().contains("upstream reset"));
    }

    #[test]
    fn test_cached_token_freshness() {
        let now = Utc::now();
        let fresh = CachedToken {
            value: "t".to_string(),
            expires_at: now + ChronoDuration::seconds(3600),
        };
        let stale = CachedToken {
            value: "t".to_string(),
            expires_at: now + ChronoDuration::seconds(TOKEN_REFRESH_MARGIN_SECS / 2),
        };
        assert!(fresh.is_fresh(now));
        assert!(!stale.is_fresh(now));
    }

    #[test]
    fn test_from_config_prefers_emulator() {
        let config = ControllerConfig {
            storage_emulator_host: Some("localhost:4443".to_string()),
            ..ControllerConfig::default()
        };
        let client = GcsREST::from_config(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:4443");
        assert!(matches!(client.auth, GcsAuth::Anonymous));
    }
}
