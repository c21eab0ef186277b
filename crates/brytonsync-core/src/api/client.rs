//! API client for the Ride with GPS REST API.
//!
//! Covers the handful of endpoints the sync needs: token exchange, the
//! paginated route listing (also used as the token probe) and trip upload.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{AuthToken, TokenUser};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

const API_KEY_HEADER: &str = "x-rwgps-api-key";
const AUTH_TOKEN_HEADER: &str = "x-rwgps-auth-token";

/// Statuses the trip endpoint uses to acknowledge an upload.
const UPLOAD_ACCEPTED: [StatusCode; 3] = [StatusCode::OK, StatusCode::CREATED, StatusCode::ACCEPTED];

#[derive(Debug, Serialize)]
struct AuthRequest<'a> {
    user: AuthRequestUser<'a>,
}

#[derive(Debug, Serialize)]
struct AuthRequestUser<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    auth_token: AuthTokenBody,
}

#[derive(Debug, Deserialize)]
struct AuthTokenBody {
    auth_token: String,
    #[serde(default)]
    user: Option<TokenUser>,
}

/// One entry of the user's route listing.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteSummary {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    /// Metres
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl RouteSummary {
    pub fn distance_km(&self) -> Option<f64> {
        self.distance.map(|m| (m / 10.0).round() / 100.0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub record_count: Option<u64>,
    #[serde(default)]
    pub page_count: Option<u64>,
    #[serde(default)]
    pub next_page_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutesMeta {
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutesPage {
    #[serde(default)]
    pub routes: Vec<RouteSummary>,
    #[serde(default)]
    pub meta: RoutesMeta,
}

/// API client for Ride with GPS.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            token: None,
        })
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            token: Some(token),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Exchange account credentials for an auth token.
    ///
    /// Only `201 Created` counts as success. No retry is attempted.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<AuthToken, ApiError> {
        let url = format!("{}/api/v1/auth_tokens.json", self.base_url);
        let body = AuthRequest {
            user: AuthRequestUser { email, password },
        };

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::AuthRejected {
                status: status.as_u16(),
                body: ApiError::truncate_body(&body),
            });
        }

        let text = response.text().await?;
        let parsed: AuthResponse = serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse auth response: {}", e)))?;

        if parsed.auth_token.auth_token.trim().is_empty() {
            return Err(ApiError::InvalidResponse("Empty auth token in response".to_string()));
        }

        Ok(AuthToken {
            token: parsed.auth_token.auth_token,
            user: parsed.auth_token.user,
        })
    }

    /// Check whether `token` is still accepted by the platform.
    ///
    /// Fail-closed: anything but `200 OK` (transport errors included) is invalid.
    pub async fn probe_token(&self, token: &str) -> bool {
        let url = format!("{}/api/v1/routes.json", self.base_url);
        let result = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(AUTH_TOKEN_HEADER, token)
            .query(&[("page", 1)])
            .send()
            .await;

        match result {
            Ok(response) if response.status() == StatusCode::OK => true,
            Ok(response) => {
                debug!(status = %response.status(), "Token probe rejected");
                false
            }
            Err(e) => {
                warn!(error = %e, "Token probe failed");
                false
            }
        }
    }

    /// Fetch one page of the authenticated user's routes.
    pub async fn list_routes(&self, page: u32) -> Result<RoutesPage, ApiError> {
        let url = format!("{}/api/v1/routes.json", self.base_url);
        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers()?)
            .query(&[("page", page)])
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse routes: {}", e)))
    }

    /// Upload one activity file as a new trip.
    pub async fn upload_trip(&self, path: &Path) -> Result<StatusCode, ApiError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = tokio::fs::read(path).await.map_err(|source| ApiError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/octet-stream")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = format!("{}/trips", self.base_url);
        let response = self
            .client
            .post(&url)
            .headers(self.auth_headers()?)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if UPLOAD_ACCEPTED.contains(&status) {
            Ok(status)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::UploadRejected {
                status: status.as_u16(),
                body: ApiError::truncate_body(&body),
            })
        }
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let invalid = |_| ApiError::InvalidResponse("Header value contains invalid characters".to_string());

        let mut headers = header::HeaderMap::new();
        headers.insert(
            API_KEY_HEADER,
            header::HeaderValue::from_str(&self.api_key).map_err(invalid)?,
        );
        if let Some(ref token) = self.token {
            headers.insert(
                AUTH_TOKEN_HEADER,
                header::HeaderValue::from_str(token).map_err(invalid)?,
            );
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(&server.base_url(), "key123", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_authenticate_created_returns_token_and_user() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v1/auth_tokens.json")
                    .header("x-rwgps-api-key", "key123")
                    .json_body(json!({"user": {"email": "rider@example.org", "password": "pw"}}));
                then.status(201).json_body(json!({
                    "auth_token": {
                        "auth_token": "tok-abc",
                        "user": {"id": 7, "name": "Rider", "email": "rider@example.org"}
                    }
                }));
            })
            .await;

        let token = client_for(&server)
            .authenticate("rider@example.org", "pw")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(token.token, "tok-abc");
        let user = token.user.unwrap();
        assert_eq!(user.name.as_deref(), Some("Rider"));
        assert_eq!(user.id, Some(7));
    }

    #[tokio::test]
    async fn test_authenticate_ok_is_not_created() {
        // 200 is not the documented success status for the exchange
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/auth_tokens.json");
                then.status(200)
                    .json_body(json!({"auth_token": {"auth_token": "tok"}}));
            })
            .await;

        let err = client_for(&server).authenticate("a", "b").await.unwrap_err();
        assert!(matches!(err, ApiError::AuthRejected { status: 200, .. }));
    }

    #[tokio::test]
    async fn test_authenticate_bad_credentials() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/auth_tokens.json");
                then.status(401).body("{\"error\":\"Invalid email or password\"}");
            })
            .await;

        let err = client_for(&server).authenticate("a", "b").await.unwrap_err();
        match err {
            ApiError::AuthRejected { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("Invalid email"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_authenticate_malformed_payload() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/auth_tokens.json");
                then.status(201).body("<html>not json</html>");
            })
            .await;

        let err = client_for(&server).authenticate("a", "b").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_probe_token_accepts_only_ok() {
        let server = MockServer::start_async().await;
        let good = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v1/routes.json")
                    .query_param("page", "1")
                    .header("x-rwgps-api-key", "key123")
                    .header("x-rwgps-auth-token", "good");
                then.status(200).json_body(json!({"routes": []}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v1/routes.json")
                    .header("x-rwgps-auth-token", "stale");
                then.status(401);
            })
            .await;

        let client = client_for(&server);
        assert!(client.probe_token("good").await);
        assert!(!client.probe_token("stale").await);
        good.assert_async().await;
    }

    #[tokio::test]
    async fn test_probe_token_transport_failure_is_invalid() {
        // Nothing listens on port 9 locally
        let client = ApiClient::new("http://127.0.0.1:9", "key", Duration::from_secs(2)).unwrap();
        assert!(!client.probe_token("anything").await);
    }

    #[tokio::test]
    async fn test_list_routes_parses_page() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v1/routes.json")
                    .query_param("page", "2")
                    .header("x-rwgps-auth-token", "tok");
                then.status(200).json_body(json!({
                    "routes": [
                        {"id": 11, "name": "Loop", "distance": 42195.0, "created_at": "2024-05-01T08:00:00Z"},
                        {"id": 12, "name": "Commute"}
                    ],
                    "meta": {"pagination": {"record_count": 27, "page_count": 2}}
                }));
            })
            .await;

        let page = client_for(&server)
            .with_token("tok".to_string())
            .list_routes(2)
            .await
            .unwrap();

        assert_eq!(page.routes.len(), 2);
        assert_eq!(page.routes[0].distance_km(), Some(42.2));
        assert_eq!(page.routes[1].distance_km(), None);
        assert_eq!(page.meta.pagination.page_count, Some(2));
    }

    #[tokio::test]
    async fn test_list_routes_unauthorized() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/routes.json");
                then.status(401);
            })
            .await;

        let err = client_for(&server).list_routes(1).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn test_upload_trip_sends_multipart_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ride1.fit");
        std::fs::write(&path, b"FITDATA").unwrap();

        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/trips")
                    .header("x-rwgps-api-key", "key123")
                    .header("x-rwgps-auth-token", "tok")
                    .body_includes("filename=\"ride1.fit\"")
                    .body_includes("FITDATA");
                then.status(202);
            })
            .await;

        let status = client_for(&server)
            .with_token("tok".to_string())
            .upload_trip(&path)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_upload_trip_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ride1.fit");
        std::fs::write(&path, b"FITDATA").unwrap();

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/trips");
                then.status(422).body("duplicate trip");
            })
            .await;

        let err = client_for(&server)
            .with_token("tok".to_string())
            .upload_trip(&path)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::UploadRejected { status: 422, .. }));
    }

    #[tokio::test]
    async fn test_upload_trip_missing_file() {
        let client = ApiClient::new("http://127.0.0.1:9", "key", Duration::from_secs(2)).unwrap();
        let err = client
            .upload_trip(Path::new("/definitely/not/here.fit"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Io { .. }));
    }
}
