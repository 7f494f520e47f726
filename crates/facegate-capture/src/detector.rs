//! Multipart upload to the face-detection endpoint.

use async_trait::async_trait;
use facegate_types::{
    capture::{DetectionResponse, DetectionResult, ImagePayload},
    config::CaptureConfig,
    FacegateError, Result,
};
use reqwest::{
    multipart::{Form, Part},
    Client, StatusCode,
};
use tracing::{debug, info};

use crate::DetectionClient;

/// File name browsers give to an unnamed blob in form data.
pub const BLOB_FILE_NAME: &str = "blob";

pub struct HttpDetectionClient {
    client: Client,
    endpoint: String,
    field_name: String,
}

impl HttpDetectionClient {
    pub fn new(config: &CaptureConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: &CaptureConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            field_name: config.field_name.clone(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DetectionClient for HttpDetectionClient {
    async fn detect(&self, payload: ImagePayload) -> Result<Option<DetectionResult>> {
        let size = payload.len();
        let part = Part::bytes(payload.bytes)
            .file_name(BLOB_FILE_NAME)
            .mime_str(&payload.mime)
            .map_err(|err| transport_error(format!("invalid payload type: {err}")))?;
        let form = Form::new().part(self.field_name.clone(), part);

        debug!("Posting {} byte image to {}", size, self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|err| transport_error(format!("POST {} failed: {err}", self.endpoint)))?;

        let status = response.status();
        if status != StatusCode::OK {
            debug!("Detection endpoint answered {}; ignoring", status);
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|err| transport_error(format!("reading response failed: {err}")))?;
        let parsed: DetectionResponse = serde_json::from_str(&body).map_err(|err| {
            FacegateError::Detection(format!("unexpected response body {body:?}: {err}"))
        })?;
        let result = DetectionResult::from(parsed);
        info!("Server response: {} face(s)", result.faces);
        Ok(Some(result))
    }
}

pub fn transport_error(message: impl Into<String>) -> FacegateError {
    FacegateError::Transport(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Multipart,
        http::StatusCode as AxumStatus,
        response::IntoResponse,
        routing::post,
        Json, Router,
    };
    use tokio::net::TcpListener;

    async fn spawn(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}/face")
    }

    async fn count_faces(mut multipart: Multipart) -> impl IntoResponse {
        let mut seen = Vec::new();
        while let Ok(Some(field)) = multipart.next_field().await {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map(|b| b.len()).unwrap_or_default();
            seen.push((name, file_name, content_type, bytes));
        }
        match seen.as_slice() {
            [(name, file, mime, 4)] if name == "imgarr" && file == "blob" && mime == "image/png" => {
                Json(3).into_response()
            }
            _ => AxumStatus::BAD_REQUEST.into_response(),
        }
    }

    fn config(endpoint: String) -> CaptureConfig {
        CaptureConfig {
            endpoint,
            ..CaptureConfig::default()
        }
    }

    #[tokio::test]
    async fn posts_single_multipart_field_and_reads_count() {
        let endpoint = spawn(Router::new().route("/face", post(count_faces))).await;
        let client = HttpDetectionClient::new(&config(endpoint));
        let result = client
            .detect(ImagePayload::new("image/png", vec![1, 2, 3, 4]))
            .await
            .expect("detect");
        assert_eq!(result, Some(DetectionResult::new(3)));
        assert_eq!(result.map(|r| r.display_text()).as_deref(), Some("Number of faces : 3"));
    }

    #[tokio::test]
    async fn non_ok_status_is_ignored() {
        let endpoint = spawn(Router::new().route(
            "/face",
            post(|| async { (AxumStatus::SERVICE_UNAVAILABLE, "busy") }),
        ))
        .await;
        let client = HttpDetectionClient::new(&config(endpoint));
        let result = client
            .detect(ImagePayload::new("image/png", vec![0; 8]))
            .await
            .expect("non-200 is not an error");
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn non_json_body_is_a_detection_error() {
        let endpoint =
            spawn(Router::new().route("/face", post(|| async { "three faces" }))).await;
        let client = HttpDetectionClient::new(&config(endpoint));
        let err = client
            .detect(ImagePayload::new("image/png", vec![0; 8]))
            .await
            .expect_err("malformed body");
        assert!(matches!(err, FacegateError::Detection(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);
        let client = HttpDetectionClient::new(&config(format!("http://{addr}/face")));
        let err = client
            .detect(ImagePayload::new("image/png", vec![0; 8]))
            .await
            .expect_err("nothing listening");
        assert!(matches!(err, FacegateError::Transport(_)));
    }
}
