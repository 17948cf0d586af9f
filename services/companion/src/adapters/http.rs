//! services/companion/src/adapters/http.rs
//!
//! The shared HTTP client for the REST backend. Every backend adapter goes through
//! `BackendClient`, which attaches the current access token, decodes JSON, and maps HTTP
//! failures onto `PortError`.

use crate::auth::AuthContext;
use reqwest::{header::AUTHORIZATION, Client, Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use video_learning_core::ports::{PortError, PortResult};

const USER_AGENT: &str = "video-learning-companion/0.1 (+reqwest)";

#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
    auth: AuthContext,
}

impl BackendClient {
    pub fn new(
        base_url: impl Into<String>,
        auth: AuthContext,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match self.auth.access_token() {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => builder,
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> PortResult<T> {
        self.send_json(self.request(Method::GET, path)).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> PortResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(self.request(Method::POST, path).json(body)).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> PortResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(self.request(Method::PUT, path).json(body)).await
    }

    /// POSTs a body and ignores whatever the backend answers with on success.
    pub async fn post_unit<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> PortResult<()> {
        self.send(self.request(Method::POST, path).json(body)).await?;
        Ok(())
    }

    async fn send(&self, builder: RequestBuilder) -> PortResult<reqwest::Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Backend request failed: {}", e)))?;

        let status = response.status();
        debug!("{} {}", status.as_u16(), response.url());
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        warn!("Backend returned HTTP {} for {}", status.as_u16(), url);
        Err(status_to_error(status, &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> PortResult<T> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed backend response: {}", e)))
    }
}

/// Maps a non-success HTTP status to the port error the rest of the app understands.
pub fn status_to_error(status: StatusCode, body: &str) -> PortError {
    let message = error_message(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    });
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Unauthorized,
        StatusCode::PAYMENT_REQUIRED => PortError::PaymentRequired(message),
        StatusCode::NOT_FOUND => PortError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => PortError::Invalid(message),
        _ => PortError::Unexpected(format!("HTTP {}: {}", status.as_u16(), message)),
    }
}

/// Pulls a human-readable message out of an error body (`detail`, `error` or `message`).
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "error", "message"] {
            match value.get(key) {
                Some(serde_json::Value::String(s)) => return Some(s.clone()),
                Some(other) if !other.is_null() => return Some(other.to_string()),
                _ => {}
            }
        }
    }
    Some(body.chars().take(200).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_required_keeps_backend_message() {
        let err = status_to_error(StatusCode::PAYMENT_REQUIRED, r#"{"detail": "Insufficient credits"}"#);
        assert!(matches!(err, PortError::PaymentRequired(msg) if msg == "Insufficient credits"));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(status_to_error(StatusCode::UNAUTHORIZED, ""), PortError::Unauthorized));
        assert!(matches!(status_to_error(StatusCode::FORBIDDEN, ""), PortError::Unauthorized));
        assert!(matches!(
            status_to_error(StatusCode::NOT_FOUND, r#"{"error": "Video not found"}"#),
            PortError::NotFound(msg) if msg == "Video not found"
        ));
        assert!(matches!(
            status_to_error(StatusCode::UNPROCESSABLE_ENTITY, r#"{"message": "bad url"}"#),
            PortError::Invalid(msg) if msg == "bad url"
        ));
        assert!(matches!(
            status_to_error(StatusCode::BAD_GATEWAY, ""),
            PortError::Unexpected(msg) if msg == "HTTP 502: Bad Gateway"
        ));
    }

    #[test]
    fn test_plain_text_bodies_are_truncated() {
        let body = "x".repeat(500);
        match status_to_error(StatusCode::INTERNAL_SERVER_ERROR, &body) {
            PortError::Unexpected(msg) => assert_eq!(msg.len(), "HTTP 500: ".len() + 200),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_url_joining() {
        let client = BackendClient::new("https://api.example.com/", AuthContext::new(), Duration::from_secs(5)).unwrap();
        assert_eq!(client.url("/api/videos"), "https://api.example.com/api/videos");
        assert_eq!(client.url("api/videos"), "https://api.example.com/api/videos");
    }
}
