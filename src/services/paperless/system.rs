//! Server status, version, profile and statistics

use reqwest::Method;

use super::{PaperlessService, Payload};
use crate::error::PaperlessError;

impl PaperlessService {
    /// GET `/api/status/`
    pub async fn get_status(&self) -> Result<Payload, PaperlessError> {
        self.get_json("/api/status/", &[]).await
    }

    /// GET `/api/remote_version/`
    pub async fn get_remote_version(&self) -> Result<Payload, PaperlessError> {
        self.get_json("/api/remote_version/", &[]).await
    }

    /// GET `/api/profile/`
    pub async fn get_profile(&self) -> Result<Payload, PaperlessError> {
        self.get_json("/api/profile/", &[]).await
    }

    /// Ask the server to issue a new API token for the current user
    pub async fn generate_auth_token(&self) -> Result<Payload, PaperlessError> {
        self.send_json(self.request(Method::POST, "/api/profile/generate_auth_token/"))
            .await
    }

    /// GET `/api/statistics/`
    pub async fn get_statistics(&self) -> Result<Payload, PaperlessError> {
        self.get_json("/api/statistics/", &[]).await
    }

    /// Check that the server answers the status endpoint.
    ///
    /// Failures are logged and reported as `false`.
    pub async fn test_connection(&self) -> bool {
        match self.get_status().await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(
                    base_url = %self.base_url,
                    error = %e,
                    "Paperless connection test failed"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::service_for;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_generate_auth_token_posts() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/profile/generate_auth_token/");
            then.status(200).json_body(json!("f1e2d3c4b5"));
        });

        let payload = service_for(&server.base_url())
            .generate_auth_token()
            .await
            .unwrap();
        mock.assert();
        assert_eq!(payload, json!({"id": "f1e2d3c4b5"}));
    }

    #[tokio::test]
    async fn test_statistics_and_version() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/statistics/");
            then.status(200)
                .json_body(json!({"documents_total": 12, "documents_inbox": 3}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/remote_version/");
            then.status(200)
                .json_body(json!({"version": "2.7.2", "update_available": false}));
        });

        let service = service_for(&server.base_url());
        assert_eq!(service.get_statistics().await.unwrap()["documents_total"], 12);
        assert_eq!(service.get_remote_version().await.unwrap()["version"], "2.7.2");
    }

    #[tokio::test]
    async fn test_connection_true_and_false() {
        let server = MockServer::start_async().await;
        let mut ok = server.mock(|when, then| {
            when.method(GET).path("/api/status/");
            then.status(200).json_body(json!({"pngx_version": "2.7.2"}));
        });

        let service = service_for(&server.base_url());
        assert!(service.test_connection().await);

        ok.delete();
        server.mock(|when, then| {
            when.method(GET).path("/api/status/");
            then.status(401).json_body(json!({"detail": "Invalid token."}));
        });
        assert!(!service.test_connection().await);
    }
}
