//! HTTP implementation of [`ExtractionService`]

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use std::path::Path;
use tracing::debug;

use super::ExtractionService;
use super::wire::{ChatCompletionRequest, ChatCompletionResponse, FileObject};
use crate::config::ApiConfig;
use crate::error::{Error, ExtractionError, RemoteOperation, Result};
use crate::types::RemoteFileHandle;

/// Client for an OpenAI-compatible file extraction and chat-completions API
#[derive(Clone, Debug)]
pub struct HttpExtractionClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    upload_purpose: String,
}

impl HttpExtractionClient {
    /// Build a client with bearer authentication and the configured request timeout
    ///
    /// # Errors
    /// Returns error if the API key is not a valid header value or the HTTP client
    /// cannot be created
    pub fn new(config: &ApiConfig, api_key: &str) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| Error::config("API key contains invalid characters", "api_key"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .user_agent(concat!("invoice-batch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            upload_purpose: config.upload_purpose.clone(),
        })
    }

    /// Model used for completions
    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

/// Turn a non-success response into [`ExtractionError::HttpStatus`]
async fn check_status(
    operation: RemoteOperation,
    response: reqwest::Response,
) -> std::result::Result<reqwest::Response, ExtractionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ExtractionError::HttpStatus {
        operation,
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ExtractionService for HttpExtractionClient {
    async fn upload(&self, path: &Path) -> std::result::Result<RemoteFileHandle, ExtractionError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|e| ExtractionError::Transport {
                operation: RemoteOperation::Upload,
                reason: e.to_string(),
            })?;
        if !exists {
            return Err(ExtractionError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let data = tokio::fs::read(path)
            .await
            .map_err(|e| ExtractionError::Transport {
                operation: RemoteOperation::Upload,
                reason: format!("failed to read {}: {}", path.display(), e),
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());

        let part = reqwest::multipart::Part::bytes(data)
            .file_name(file_name)
            .mime_str("application/octet-stream")
            .map_err(|e| ExtractionError::transport(RemoteOperation::Upload, e))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("purpose", self.upload_purpose.clone());

        let response = self
            .http
            .post(self.url("files"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ExtractionError::transport(RemoteOperation::Upload, e))?;
        let response = check_status(RemoteOperation::Upload, response).await?;

        let file: FileObject = response
            .json()
            .await
            .map_err(|e| ExtractionError::malformed(RemoteOperation::Upload, e))?;
        if file.id.is_empty() {
            return Err(ExtractionError::malformed(
                RemoteOperation::Upload,
                "empty file id",
            ));
        }

        debug!(
            file_id = %file.id,
            filename = file.filename.as_deref().unwrap_or_default(),
            bytes = file.bytes.unwrap_or_default(),
            "uploaded document"
        );
        Ok(RemoteFileHandle::new(file.id))
    }

    async fn fetch_content(
        &self,
        handle: &RemoteFileHandle,
    ) -> std::result::Result<String, ExtractionError> {
        let response = self
            .http
            .get(self.url(&format!("files/{}/content", handle.id())))
            .send()
            .await
            .map_err(|e| ExtractionError::transport(RemoteOperation::FetchContent, e))?;
        let response = check_status(RemoteOperation::FetchContent, response).await?;

        response
            .text()
            .await
            .map_err(|e| ExtractionError::transport(RemoteOperation::FetchContent, e))
    }

    async fn infer(
        &self,
        prompt: &str,
        system_prompt: &str,
    ) -> std::result::Result<String, ExtractionError> {
        let request = ChatCompletionRequest::json_object(&self.model, system_prompt, prompt);

        let response = self
            .http
            .post(self.url("chat/completions"))
            .json(&request)
            .send()
            .await
            .map_err(|e| ExtractionError::transport(RemoteOperation::Infer, e))?;
        let response = check_status(RemoteOperation::Infer, response).await?;

        let body = response
            .text()
            .await
            .map_err(|e| ExtractionError::transport(RemoteOperation::Infer, e))?;
        let completion: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| ExtractionError::malformed(RemoteOperation::Infer, e))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ExtractionError::malformed(RemoteOperation::Infer, "no choices"))?;
        let content = choice.message.content.ok_or_else(|| {
            ExtractionError::malformed(RemoteOperation::Infer, "first choice has no content")
        })?;

        Ok(content.trim().to_string())
    }

    async fn delete(&self, handle: &RemoteFileHandle) -> std::result::Result<(), ExtractionError> {
        let response = self
            .http
            .delete(self.url(&format!("files/{}", handle.id())))
            .send()
            .await
            .map_err(|e| ExtractionError::transport(RemoteOperation::Delete, e))?;
        check_status(RemoteOperation::Delete, response).await?;
        Ok(())
    }
}
