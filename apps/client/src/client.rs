//! HTTP client for the tracker API, shared by the capture and dashboard sides.
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Application, ApplicationUpdate, IssuedToken, NewApplication, User};

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum ClientError {
    /// Network failure or timeout. The stored credential may still be good.
    #[error("Cannot reach the tracker: {0}")]
    Connectivity(#[source] reqwest::Error),

    #[error("Not signed in, or the session has expired")]
    Unauthenticated,

    #[error("Request rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected response from the tracker: {0}")]
    Decode(String),
}

/// Result of submitting an application.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Created(Application),
    /// The pair is already tracked; carries the existing record when the
    /// server returned it.
    AlreadyTracked(Option<Application>),
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: Option<String>,
    existing_application: Option<Application>,
}

#[derive(Clone)]
pub struct TrackerClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl TrackerClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::Connectivity)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Presents `token` as a bearer credential on every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await.map_err(|e| {
            warn!("Tracker request failed: {e}");
            ClientError::Connectivity(e)
        })?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthenticated);
        }
        Ok(response)
    }

    async fn rejected(response: Response) -> ClientError {
        let status = response.status().as_u16();
        let body: ErrorBody = response.json().await.unwrap_or_default();
        ClientError::Rejected {
            status,
            message: body.error.unwrap_or_else(|| "no error message".to_string()),
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        if !response.status().is_success() {
            return Err(Self::rejected(response).await);
        }
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(envelope.data)
    }

    pub async fn me(&self) -> Result<User, ClientError> {
        let response = self.execute(self.http.get(self.url("/api/auth/me"))).await?;
        Self::decode(response).await
    }

    /// Exchanges the current credential for a bearer token the extension can keep.
    pub async fn issue_token(&self) -> Result<IssuedToken, ClientError> {
        let response = self.execute(self.http.get(self.url("/api/auth/token"))).await?;
        Self::decode(response).await
    }

    pub async fn list(&self) -> Result<Vec<Application>, ClientError> {
        let response = self
            .execute(self.http.get(self.url("/api/applications")))
            .await?;
        Self::decode(response).await
    }

    pub async fn create(&self, new: &NewApplication) -> Result<SubmitOutcome, ClientError> {
        let response = self
            .execute(self.http.post(self.url("/api/applications")).json(new))
            .await?;

        if response.status() == StatusCode::CONFLICT {
            let body: ErrorBody = response.json().await.unwrap_or_default();
            debug!(
                "Already tracked: {} / {}",
                new.company_name, new.job_title
            );
            return Ok(SubmitOutcome::AlreadyTracked(body.existing_application));
        }
        Self::decode(response).await.map(SubmitOutcome::Created)
    }

    pub async fn update(&self, id: Uuid, update: &ApplicationUpdate) -> Result<Application, ClientError> {
        let response = self
            .execute(
                self.http
                    .put(self.url(&format!("/api/applications/{id}")))
                    .json(update),
            )
            .await?;
        Self::decode(response).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        let response = self
            .execute(self.http.delete(self.url(&format!("/api/applications/{id}"))))
            .await?;
        Self::decode::<serde_json::Value>(response).await.map(|_| ())
    }

    pub async fn export_csv(&self) -> Result<String, ClientError> {
        let response = self
            .execute(self.http.get(self.url("/api/applications/export")))
            .await?;
        if !response.status().is_success() {
            return Err(Self::rejected(response).await);
        }
        response
            .text()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::net::SocketAddr;

    use axum::{
        extract::Path,
        http::{header, HeaderMap, StatusCode},
        routing::{get, post, put},
        Json, Router,
    };
    use chrono::Utc;
    use serde_json::{json, Value};

    use super::*;
    use crate::models::{Source, Status};

    pub(crate) fn sample_application(company: &str, title: &str) -> Value {
        let now = Utc::now();
        json!({
            "id": Uuid::new_v4(),
            "user_id": Uuid::new_v4(),
            "company_name": company,
            "job_title": title,
            "location": "",
            "url": "",
            "date_applied": now,
            "source": "LinkedIn",
            "status": "Applied",
            "notes": "",
            "created_at": now,
            "updated_at": now,
        })
    }

    /// Serves `router` on an ephemeral port and returns its base URL.
    pub(crate) async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn new_application() -> NewApplication {
        NewApplication {
            company_name: "Acme Corp".to_string(),
            job_title: "Engineer".to_string(),
            location: String::new(),
            url: "https://www.linkedin.com/jobs/view/1".to_string(),
            source: Source::LinkedIn,
            status: Status::Applied,
            date_applied: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_sends_bearer_and_decodes_record() {
        let router = Router::new().route(
            "/api/applications",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers[header::AUTHORIZATION], "Bearer tok");
                let record = sample_application(
                    body["company_name"].as_str().unwrap(),
                    body["job_title"].as_str().unwrap(),
                );
                (StatusCode::CREATED, Json(json!({"success": true, "data": record})))
            }),
        );
        let client = TrackerClient::new(&serve(router).await).unwrap().with_token("tok");

        match client.create(&new_application()).await.unwrap() {
            SubmitOutcome::Created(app) => assert_eq!(app.company_name, "Acme Corp"),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_status_only_update_sends_just_the_status() {
        let id = Uuid::new_v4();
        let router = Router::new().route(
            "/api/applications/:id",
            put(|Path(id): Path<Uuid>, Json(body): Json<Value>| async move {
                assert_eq!(body, json!({"status": "Interviewing"}));
                let mut record = sample_application("Acme Corp", "Engineer");
                record["id"] = json!(id);
                record["status"] = body["status"].clone();
                Json(json!({"success": true, "data": record}))
            }),
        );
        let client = TrackerClient::new(&serve(router).await).unwrap().with_token("tok");

        let update = ApplicationUpdate {
            status: Some(Status::Interviewing),
            notes: None,
        };
        let updated = client.update(id, &update).await.unwrap();
        assert_eq!(updated.id, id);
        assert_eq!(updated.status, Status::Interviewing);
    }

    #[tokio::test]
    async fn test_delete_missing_record_is_rejected() {
        let known = Uuid::new_v4();
        let router = Router::new().route(
            "/api/applications/:id",
            axum::routing::delete(move |Path(id): Path<Uuid>| async move {
                if id == known {
                    (StatusCode::OK, Json(json!({"success": true, "data": {}})))
                } else {
                    (
                        StatusCode::NOT_FOUND,
                        Json(json!({"success": false, "error": "Application not found"})),
                    )
                }
            }),
        );
        let client = TrackerClient::new(&serve(router).await).unwrap().with_token("tok");

        client.delete(known).await.unwrap();
        match client.delete(Uuid::new_v4()).await {
            Err(ClientError::Rejected { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "Application not found");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_issue_token_decodes_credential() {
        let expires_at = Utc::now();
        let router = Router::new().route(
            "/api/auth/token",
            get(move |headers: HeaderMap| async move {
                assert_eq!(headers[header::AUTHORIZATION], "Bearer pasted");
                Json(json!({"success": true, "data": {"token": "pasted", "expires_at": expires_at}}))
            }),
        );
        let client = TrackerClient::new(&serve(router).await).unwrap().with_token("pasted");

        let issued = client.issue_token().await.unwrap();
        assert_eq!(issued.token, "pasted");
        assert_eq!(issued.expires_at, expires_at);
    }

    #[tokio::test]
    async fn test_conflict_is_already_tracked_not_an_error() {
        let router = Router::new().route(
            "/api/applications",
            post(|| async {
                (
                    StatusCode::CONFLICT,
                    Json(json!({
                        "success": false,
                        "code": "DUPLICATE",
                        "error": "This job application already exists in your tracker",
                        "existingApplication": sample_application("Acme Corp", "Engineer"),
                    })),
                )
            }),
        );
        let client = TrackerClient::new(&serve(router).await).unwrap().with_token("tok");

        match client.create(&new_application()).await.unwrap() {
            SubmitOutcome::AlreadyTracked(Some(existing)) => {
                assert_eq!(existing.job_title, "Engineer")
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unauthorized_is_distinct_from_rejection() {
        let router = Router::new()
            .route(
                "/api/auth/me",
                get(|| async { (StatusCode::UNAUTHORIZED, Json(json!({"success": false}))) }),
            )
            .route(
                "/api/applications",
                get(|| async {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({"success": false, "error": "boom"})),
                    )
                }),
            );
        let client = TrackerClient::new(&serve(router).await).unwrap().with_token("tok");

        assert!(matches!(client.me().await, Err(ClientError::Unauthenticated)));
        match client.list().await {
            Err(ClientError::Rejected { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connectivity_error() {
        // Bind then drop to get a port nothing is listening on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = TrackerClient::new(&format!("http://{addr}")).unwrap();
        assert!(matches!(client.list().await, Err(ClientError::Connectivity(_))));
    }

    #[tokio::test]
    async fn test_timeout_is_connectivity_error() {
        let router = Router::new().route(
            "/api/applications",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"success": true, "data": []}))
            }),
        );
        let client =
            TrackerClient::with_timeout(&serve(router).await, Duration::from_millis(100)).unwrap();
        match client.list().await {
            Err(ClientError::Connectivity(e)) => assert!(e.is_timeout()),
            other => panic!("unexpected result {other:?}"),
        }
    }
}
