use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AnnotatorError;
use crate::types::{AnnotateImageRequest, AnnotationResult};

/// Remote image annotation seam. Implementations perform exactly one call per
/// invocation and leave retries to their caller.
#[async_trait]
pub trait ImageAnnotator: Send + Sync {
    async fn annotate(
        &self,
        request: &AnnotateImageRequest,
    ) -> Result<AnnotationResult, AnnotatorError>;
}

#[derive(Serialize)]
struct BatchAnnotateImagesRequest<'a> {
    requests: [&'a AnnotateImageRequest; 1],
}

#[derive(Deserialize)]
struct BatchAnnotateImagesResponse {
    #[serde(default)]
    responses: Vec<AnnotationResult>,
}

/// Annotation client speaking the `images:annotate` REST endpoint.
#[derive(Debug, Clone)]
pub struct HttpImageAnnotator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpImageAnnotator {
    /// Builds a client for `endpoint` (e.g. `https://vision.googleapis.com`)
    /// whose requests give up after `timeout`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AnnotatorError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn annotate_url(&self) -> String {
        format!("{}/v1/images:annotate", self.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl ImageAnnotator for HttpImageAnnotator {
    async fn annotate(
        &self,
        request: &AnnotateImageRequest,
    ) -> Result<AnnotationResult, AnnotatorError> {
        let url = self.annotate_url();
        debug!(%url, image_uri = request.image_uri(), "calling annotation service");

        let res = self
            .client
            .post(&url)
            .json(&BatchAnnotateImagesRequest {
                requests: [request],
            })
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AnnotatorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = res.bytes().await?;
        let batch: BatchAnnotateImagesResponse = serde_json::from_slice(&bytes)?;
        batch
            .responses
            .into_iter()
            .next()
            .ok_or(AnnotatorError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Likelihood, Status};

    use anyhow::Result;
    use axum::{http::StatusCode, Json, Router};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    async fn spawn_stub(
        status: StatusCode,
        body: Value,
    ) -> Result<(String, Arc<Mutex<Vec<(String, Value)>>>)> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let app = Router::new().fallback(move |uri: axum::http::Uri, Json(payload): Json<Value>| {
            let recorder = recorder.clone();
            let body = body.clone();
            async move {
                recorder.lock().await.push((uri.path().to_string(), payload));
                (status, Json(body))
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok((format!("http://{addr}"), seen))
    }

    #[tokio::test]
    async fn posts_batch_request_and_decodes_first_response() -> Result<()> {
        let (endpoint, seen) = spawn_stub(
            StatusCode::OK,
            json!({
                "responses": [{
                    "labelAnnotations": [ { "description": "Cat", "score": 0.9 } ],
                    "safeSearchAnnotation": { "adult": "UNLIKELY" }
                }]
            }),
        )
        .await?;

        let client = HttpImageAnnotator::new(endpoint, Duration::from_secs(5))?;
        let request = AnnotateImageRequest::for_uri("gs://uploads/cat.jpg");
        let result = client.annotate(&request).await?;

        let AnnotationResult::Success(annotations) = result else {
            panic!("expected success");
        };
        assert_eq!(annotations.label_annotations[0].description, "Cat");
        assert_eq!(
            annotations.safe_search_annotation.unwrap().adult,
            Some(Likelihood::Unlikely)
        );

        let seen = seen.lock().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "/v1/images:annotate");
        assert_eq!(
            seen[0].1["requests"][0]["image"]["source"]["imageUri"],
            "gs://uploads/cat.jpg"
        );
        assert_eq!(seen[0].1["requests"][0]["features"].as_array().unwrap().len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn per_image_error_is_returned_as_result() -> Result<()> {
        let (endpoint, _seen) = spawn_stub(
            StatusCode::OK,
            json!({ "responses": [ { "error": { "code": 3, "message": "bad image" } } ] }),
        )
        .await?;

        let client = HttpImageAnnotator::new(endpoint, Duration::from_secs(5))?;
        let result = client
            .annotate(&AnnotateImageRequest::for_uri("gs://uploads/broken.png"))
            .await?;
        assert_eq!(
            result,
            AnnotationResult::Error(Status {
                code: 3,
                message: "bad image".into()
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn http_failure_is_a_transport_error() -> Result<()> {
        let (endpoint, _seen) = spawn_stub(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "error": { "code": 503, "message": "unavailable" } }),
        )
        .await?;

        let client = HttpImageAnnotator::new(endpoint, Duration::from_secs(5))?;
        let err = client
            .annotate(&AnnotateImageRequest::for_uri("gs://uploads/cat.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, AnnotatorError::Status { status: 503, .. }));
        Ok(())
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() -> Result<()> {
        let (endpoint, _seen) = spawn_stub(StatusCode::OK, json!({ "responses": [] })).await?;

        let client = HttpImageAnnotator::new(format!("{endpoint}/"), Duration::from_secs(5))?;
        let err = client
            .annotate(&AnnotateImageRequest::for_uri("gs://uploads/cat.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, AnnotatorError::EmptyResponse));
        Ok(())
    }
}
