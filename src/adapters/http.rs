use crate::domain::model::{ClassificationOutcome, ClassificationRequest};
use crate::domain::ports::{Classifier, ConfigProvider};
use crate::utils::error::{ClientError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Classifier reached over `GET <endpoint>?name1=..&name2=..&lat1=..&lon1=..&lat2=..&lon2=..`.
pub struct HttpClassifier {
    client: Client,
    endpoint: String,
}

impl HttpClassifier {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::with_timeout(endpoint, None)
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config<C: ConfigProvider + ?Sized>(config: &C) -> Result<Self> {
        Self::with_timeout(config.api_endpoint(), config.request_timeout())
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, request: &ClassificationRequest) -> Result<ClassificationOutcome> {
        tracing::debug!("Making classification request to: {}", self.endpoint);
        let response = self
            .client
            .get(&self.endpoint)
            .query(request)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("Classifier response status: {}", status);
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
            });
        }

        // 伺服器回傳的 Content-Type 不一定是 JSON，直接解析本文
        let body = response.text().await?;
        let value: serde_json::Value = serde_json::from_str(&body).map_err(ClientError::Decode)?;

        let outcome = ClassificationOutcome::from_body(&value);
        if outcome == ClassificationOutcome::Malformed {
            tracing::warn!("Classifier answer has no numeric 'res' field: {}", body);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn request() -> ClassificationRequest {
        ClassificationRequest {
            name1: "Freiburg im Breisgau, Bissierstr.".to_string(),
            name2: "Freiburg Bissierstraße".to_string(),
            lat1: 48.00199,
            lon1: 7.81989,
            lat2: 48.00223,
            lon2: 7.82006,
        }
    }

    #[tokio::test]
    async fn test_classify_sends_all_query_parameters() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api")
                .query_param("name1", "Freiburg im Breisgau, Bissierstr.")
                .query_param("name2", "Freiburg Bissierstraße")
                .query_param("lat1", "48.00199")
                .query_param("lon1", "7.81989")
                .query_param("lat2", "48.00223")
                .query_param("lon2", "7.82006");
            then.status(200)
                .header("Content-Type", "application/javascript")
                .body(r#"{"res": 0.93}"#);
        });

        let classifier = HttpClassifier::new(server.url("/api")).unwrap();
        let outcome = classifier.classify(&request()).await.unwrap();

        api_mock.assert();
        assert_eq!(outcome, ClassificationOutcome::Score(0.93));
    }

    #[tokio::test]
    async fn test_classify_bad_request_status() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/api");
            then.status(400).body("Bad request.");
        });

        let classifier = HttpClassifier::new(server.url("/api")).unwrap();
        let result = classifier.classify(&request()).await;

        api_mock.assert();
        assert!(matches!(result, Err(ClientError::Status { status: 400 })));
    }

    #[tokio::test]
    async fn test_classify_non_json_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api");
            then.status(200).body("<html>oops</html>");
        });

        let classifier = HttpClassifier::new(server.url("/api")).unwrap();
        let result = classifier.classify(&request()).await;

        assert!(matches!(result, Err(ClientError::Decode(_))));
    }

    #[tokio::test]
    async fn test_classify_missing_res_field() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api");
            then.status(200).json_body(serde_json::json!({"result": 0.9}));
        });

        let classifier = HttpClassifier::new(server.url("/api")).unwrap();
        let outcome = classifier.classify(&request()).await.unwrap();

        assert_eq!(outcome, ClassificationOutcome::Malformed);
    }

    #[tokio::test]
    async fn test_classify_unreachable_server() {
        // 連線會被拒絕
        let classifier = HttpClassifier::new("http://127.0.0.1:9/api").unwrap();
        let result = classifier.classify(&request()).await;

        assert!(matches!(result, Err(ClientError::Transport(_))));
    }
}
