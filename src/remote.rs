// src/remote.rs

use crate::config::ServerConfig;
use crate::error::IntakeError;
use crate::intake::FileHandle;
use crate::record::{InvoicePatch, InvoiceRecord, RecordId, lenient_text};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

/// Turns an uploaded file into invoice fields.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    async fn extract(&self, file: &FileHandle, notes: &str) -> Result<InvoicePatch, IntakeError>;
}

/// Persists a finished record.
#[async_trait]
pub trait SaveClient: Send + Sync {
    async fn save(&self, record: &InvoiceRecord) -> Result<RecordId, IntakeError>;
}

#[derive(Debug, Deserialize)]
struct SaveResponse {
    #[serde(default, deserialize_with = "lenient_text")]
    id: Option<String>,
}

/// Multipart upload to the extraction endpoint.
pub struct HttpExtractionClient {
    client: Client,
    url: String,
}

impl HttpExtractionClient {
    pub fn new(client: Client, server: &ServerConfig) -> Self {
        Self {
            client,
            url: server.extract_url(),
        }
    }
}

#[async_trait]
impl ExtractionClient for HttpExtractionClient {
    async fn extract(&self, file: &FileHandle, notes: &str) -> Result<InvoicePatch, IntakeError> {
        let mut part = Part::bytes(file.bytes().to_vec()).file_name(file.name().to_string());
        if let Some(media_type) = file.media_type() {
            part = part.mime_str(media_type)?;
        }
        let form = Form::new().part("file", part).text("notes", notes.to_string());

        info!(url = %self.url, file = %file.name(), "Posting file for extraction");
        let response = self.client.post(&self.url).multipart(form).send().await?;

        let mut patch: InvoicePatch = read_json(response).await?;
        // Notes belong to the user, not the extractor
        patch.notes = None;
        info!(fields = patch.field_count(), "Extraction response received");
        Ok(patch)
    }
}

/// JSON post to the save endpoint.
pub struct HttpSaveClient {
    client: Client,
    url: String,
}

impl HttpSaveClient {
    pub fn new(client: Client, server: &ServerConfig) -> Self {
        Self {
            client,
            url: server.save_url(),
        }
    }
}

#[async_trait]
impl SaveClient for HttpSaveClient {
    async fn save(&self, record: &InvoiceRecord) -> Result<RecordId, IntakeError> {
        info!(url = %self.url, file = ?record.file_name, "Saving record");
        let response = self.client.post(&self.url).json(record).send().await?;

        let saved: SaveResponse = read_json(response).await?;
        let id = saved
            .id
            .ok_or_else(|| IntakeError::Serialization("Save response has no record id.".to_string()))?;
        info!(id = %id, "Record saved");
        Ok(RecordId(id))
    }
}

/// A response counts only if the status is 2xx and the body is a JSON
/// object that parses as `T`.
///
/// Failure messages prefer the server's `error` field, then the status
/// reason phrase.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, IntakeError> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        let message = serde_json::from_slice::<Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| status_text(status));
        warn!(status = %status, message = %message, "Request failed");
        return Err(IntakeError::Transport {
            status: Some(status.as_u16()),
            message,
        });
    }

    let unexpected = |e: serde_json::Error| {
        warn!(error = %e, "Unparsable response body");
        IntakeError::Serialization(format!("Unexpected response from server: {e}"))
    };
    // Derived struct deserializers also take arrays by position
    let value: Value = serde_json::from_slice(&body).map_err(unexpected)?;
    if !value.is_object() {
        warn!(body = %value, "Response body is not a JSON object");
        return Err(IntakeError::Serialization(
            "Unexpected response from server: expected a JSON object.".to_string(),
        ));
    }
    serde_json::from_value(value).map_err(unexpected)
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}
