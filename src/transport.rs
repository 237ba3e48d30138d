//! Upload transport: carry the selected bytes to the backend.
//!
//! The controller never talks HTTP directly; it is handed an
//! [`UploadTransport`] at construction time. That keeps the network a
//! swappable collaborator — tests inject an in-memory transport instead of
//! patching global state, and the production [`HttpUploadTransport`] stays
//! a thin reqwest wrapper.

use crate::config::ViewerConfig;
use crate::error::ViewerError;
use crate::source::SelectedFile;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// Optional per-page metadata the server may return alongside the upload id.
///
/// The reference backend returns an empty list; the fields are hints only
/// and the renderer always trusts the document's own viewports over them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDescriptor {
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub height: Option<f32>,
}

/// Successful upload response body.
///
/// `upload_id` is mandatory; a 2xx body without it is malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub upload_id: String,
    #[serde(default)]
    pub pages: Vec<PageDescriptor>,
}

impl std::fmt::Display for UploadReceipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "File uploaded successfully ({})", self.upload_id)
    }
}

/// The capability of uploading a selected file and returning a receipt.
///
/// One call per selection; no retry. Implementations must be cheap to call
/// concurrently — the controller may have a superseded upload still in
/// flight while a new one starts.
pub trait UploadTransport: Send + Sync {
    fn upload(
        &self,
        file: &SelectedFile,
    ) -> impl Future<Output = Result<UploadReceipt, ViewerError>> + Send;
}

/// Production transport: `POST {api_base}/api/upload/` as multipart.
///
/// The file goes in a `file` part carrying the original filename and
/// declared MIME type, matching what the backend's multipart parser
/// expects from a browser form submission.
pub struct HttpUploadTransport {
    client: reqwest::Client,
    upload_url: String,
}

impl HttpUploadTransport {
    pub fn new(config: &ViewerConfig) -> Result<Self, ViewerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upload_timeout_secs))
            .build()
            .map_err(|e| ViewerError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            upload_url: config.upload_url(),
        })
    }
}

impl UploadTransport for HttpUploadTransport {
    async fn upload(&self, file: &SelectedFile) -> Result<UploadReceipt, ViewerError> {
        info!("uploading '{}' ({} bytes) to {}", file.name, file.bytes.len(), self.upload_url);

        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(&file.mime)
            .map_err(|e| ViewerError::Internal(format!("invalid mime '{}': {e}", file.mime)))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ViewerError::UploadFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ViewerError::UploadRejected {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| ViewerError::UploadFailed {
            reason: format!("reading response body: {e}"),
        })?;
        let receipt = parse_receipt(&body)?;
        debug!("upload accepted: id={}", receipt.upload_id);
        Ok(receipt)
    }
}

/// Parse a 2xx response body into an [`UploadReceipt`].
///
/// Kept separate from the HTTP call so the malformed-body policy is unit
/// testable without a server.
pub fn parse_receipt(body: &str) -> Result<UploadReceipt, ViewerError> {
    let receipt: UploadReceipt =
        serde_json::from_str(body).map_err(|e| ViewerError::MalformedResponse {
            detail: e.to_string(),
        })?;
    if receipt.upload_id.is_empty() {
        return Err(ViewerError::MalformedResponse {
            detail: "empty upload_id".into(),
        });
    }
    Ok(receipt)
}
